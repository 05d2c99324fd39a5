//! Argv builder for the watcher command.

use std::fmt;
use std::process::Command;

use uidwatch_types::WatchConfig;

/// A program plus arguments, rendered into a [`std::process::Command`] at
/// spawn time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
}

impl ShellCommand {
    /// `am watch-uids --oom <uid>`, with `--mask <mask>` only when the mask
    /// is non-zero.
    pub fn watch_uids(uid: u32, capability_mask: u32) -> Self {
        let mut args = vec![
            "watch-uids".to_string(),
            "--oom".to_string(),
            uid.to_string(),
        ];
        if capability_mask != 0 {
            args.push("--mask".to_string());
            args.push(capability_mask.to_string());
        }
        Self {
            program: "am".to_string(),
            args,
        }
    }

    /// An arbitrary command that speaks the watch-uids line protocol.
    pub fn raw(program: impl Into<String>, args: &[String]) -> Self {
        Self {
            program: program.into(),
            args: args.to_vec(),
        }
    }

    /// Run this command on a device through `adb [-s serial] shell`.
    ///
    /// An empty serial is treated like `None` and lets adb pick the device.
    #[must_use]
    pub fn via_adb(self, adb_program: &str, serial: Option<&str>) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 4);
        if let Some(serial) = serial.filter(|s| !s.is_empty()) {
            args.push("-s".to_string());
            args.push(serial.to_string());
        }
        args.push("shell".to_string());
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: adb_program.to_string(),
            args,
        }
    }

    /// The watch-uids command for `uid`, routed per `config.adb`.
    pub fn from_config(config: &WatchConfig, uid: u32, capability_mask: u32) -> Self {
        let cmd = Self::watch_uids(uid, capability_mask);
        if config.adb.enabled {
            cmd.via_adb(&config.adb.program, config.adb.serial.as_deref())
        } else {
            cmd
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_uids_without_mask() {
        let cmd = ShellCommand::watch_uids(10123, 0);
        assert_eq!(cmd.to_string(), "am watch-uids --oom 10123");
    }

    #[test]
    fn watch_uids_with_mask() {
        let cmd = ShellCommand::watch_uids(10123, 15);
        assert_eq!(cmd.to_string(), "am watch-uids --oom 10123 --mask 15");
    }

    #[test]
    fn adb_prefix_with_serial() {
        let cmd = ShellCommand::watch_uids(1000, 0).via_adb("adb", Some("emulator-5554"));
        assert_eq!(cmd.program(), "adb");
        assert_eq!(
            cmd.to_string(),
            "adb -s emulator-5554 shell am watch-uids --oom 1000"
        );
    }

    #[test]
    fn adb_prefix_empty_serial_uses_default_device() {
        let cmd = ShellCommand::watch_uids(1000, 0).via_adb("adb", Some(""));
        assert_eq!(cmd.to_string(), "adb shell am watch-uids --oom 1000");
    }

    #[test]
    fn from_config_respects_adb_toggle() {
        let mut config = WatchConfig::default();
        config.adb.serial = Some("R58M".into());
        let cmd = ShellCommand::from_config(&config, 10001, 0);
        assert_eq!(cmd.to_string(), "adb -s R58M shell am watch-uids --oom 10001");

        config.adb.enabled = false;
        let cmd = ShellCommand::from_config(&config, 10001, 0);
        assert_eq!(cmd.to_string(), "am watch-uids --oom 10001");
    }
}
