use std::io;
use std::process::{Command, ExitCode};

/// Replaces the current process image with `program`. The PID is kept, so
/// signals aimed at the entrypoint (SIGTERM from the container runtime) reach
/// the launched server directly. Only returns when the exec itself failed.
#[cfg(unix)]
pub(crate) fn hand_over(program: &str, args: &[String]) -> io::Result<ExitCode> {
    use std::os::unix::process::CommandExt;

    Err(Command::new(program).args(args).exec())
}

/// Without `exec`, run the program as a child and mirror its exit code.
#[cfg(not(unix))]
pub(crate) fn hand_over(program: &str, args: &[String]) -> io::Result<ExitCode> {
    let status = Command::new(program).args(args).status()?;
    Ok(match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn missing_program_reports_the_exec_error() {
        let err = hand_over("estatecore-no-such-program", &[]).expect_err("exec fails");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
