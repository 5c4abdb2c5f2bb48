use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
};

use hotglyph::reload::ReloadNames;

/// Extra font directories, searched before the defaults. Uses the platform's path list syntax.
pub const FONT_DIR_VAR: &str = "HOTGLYPH_FONT_DIR";

#[derive(Clone, Debug)]
pub struct HostConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f32,
    pub font_dirs: Vec<PathBuf>,
    pub reload: ReloadNames,
}

impl HostConfig {
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_framerate(mut self, frame_rate: f32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Applies [FONT_DIR_VAR] from the environment.
    pub fn from_env(self) -> Self {
        self.with_font_path(env::var_os(FONT_DIR_VAR))
    }

    fn with_font_path(mut self, value: Option<OsString>) -> Self {
        if let Some(value) = value {
            let mut dirs = env::split_paths(&value)
                .filter(|dir| !dir.as_os_str().is_empty())
                .collect::<Vec<_>>();
            dirs.append(&mut self.font_dirs);
            self.font_dirs = dirs;
        }
        self
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        let mut font_dirs = Vec::new();
        if let Some(exe_dir) = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            font_dirs.push(exe_dir.join("fonts"));
        }
        font_dirs.extend(system_font_dirs());

        Self {
            title: "hotglyph".into(),
            width: 960,
            height: 540,
            frame_rate: 60.0,
            font_dirs,
            reload: ReloadNames::default(),
        }
    }
}

fn system_font_dirs() -> Vec<PathBuf> {
    if cfg!(target_os = "windows") {
        let windir = env::var_os("WINDIR").unwrap_or_else(|| "C:\\Windows".into());
        vec![Path::new(&windir).join("Fonts")]
    } else if cfg!(target_os = "macos") {
        vec![
            "/System/Library/Fonts".into(),
            "/Library/Fonts".into(),
        ]
    } else {
        let mut dirs = vec![
            PathBuf::from("/usr/share/fonts"),
            PathBuf::from("/usr/local/share/fonts"),
        ];
        if let Some(home) = env::var_os("HOME") {
            dirs.push(Path::new(&home).join(".local/share/fonts"));
            dirs.push(Path::new(&home).join(".fonts"));
        }
        dirs
    }
}
