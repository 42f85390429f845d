//! Command type for building executable commands

use async_process::Command as AsyncCommand;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

/// A command to be executed
///
/// Unlike `async_process::Command` this type is `Clone` and can be logged,
/// inspected in tests and reused. It is converted with [`Command::prepare`]
/// right before spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    program: OsString,
    args: Vec<OsString>,
    env: BTreeMap<OsString, OsString>,
}

impl Command {
    /// Create a new command for the given program
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Set an environment variable for the child process
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env
            .insert(key.as_ref().to_owned(), val.as_ref().to_owned());
        self
    }

    /// Get the program name
    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    /// Get the arguments
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Get the environment overrides
    pub fn get_envs(&self) -> &BTreeMap<OsString, OsString> {
        &self.env
    }

    /// Render the command line for log messages
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Prepare this command for execution by converting to an `async_process::Command`
    ///
    /// The child is killed if the returned handle is dropped, so abandoning a
    /// future that awaits it never leaves a stray process behind.
    pub fn prepare(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);
        cmd.args(&self.args);
        for (key, val) in &self.env {
            cmd.env(key, val);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_creation() {
        let cmd = Command::new("docker");
        assert_eq!(cmd.get_program(), "docker");
        assert!(cmd.get_args().is_empty());
    }

    #[test]
    fn test_command_with_args() {
        let mut cmd = Command::new("docker");
        cmd.arg("inspect").args(["--type", "container"]).arg("abc123");

        assert_eq!(cmd.get_args().len(), 4);
        assert_eq!(cmd.get_args()[0], "inspect");
        assert_eq!(cmd.get_args()[3], "abc123");
        assert_eq!(cmd.display(), "docker inspect --type container abc123");
    }

    #[test]
    fn test_command_env() {
        let mut cmd = Command::new("docker");
        cmd.env("DOCKER_HOST", "unix:///var/run/docker.sock");

        assert_eq!(
            cmd.get_envs().get(OsStr::new("DOCKER_HOST")),
            Some(&OsString::from("unix:///var/run/docker.sock"))
        );
    }

    #[test]
    fn test_command_clone() {
        let mut cmd1 = Command::new("docker");
        cmd1.arg("ps");
        let cmd2 = cmd1.clone();
        assert_eq!(cmd1, cmd2);
    }
}
