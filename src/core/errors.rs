human_errors::error_shim!(TugaError);

/// A fatal error raised by the virtual machine while executing an
/// instruction. The instruction index points at the faulting opcode.
pub fn runtime<M: AsRef<str>, A: AsRef<str>>(at: usize, message: M, advice: A) -> TugaError {
    user(
        &format!("Execution failed at instruction {}: {}", at, message.as_ref()),
        advice.as_ref(),
    )
}

/// A violation of a code-generation contract (for example a call to a
/// function which was never emitted). These indicate a compiler bug or a
/// program which should have been rejected by the type checker.
pub fn generator<M: AsRef<str>, A: AsRef<str>>(message: M, advice: A) -> TugaError {
    system(message.as_ref(), advice.as_ref())
}

/// A malformed bytecode file was handed to the loader.
pub fn bytecode<M: AsRef<str>, A: AsRef<str>>(message: M, advice: A) -> TugaError {
    user(message.as_ref(), advice.as_ref())
}

impl From<std::io::Error> for TugaError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => user_with_internal(
                "We could not find the file you provided.",
                "Make sure that the file exists and that you have permissions to access it.",
                e,
            ),
            std::io::ErrorKind::PermissionDenied => user_with_internal(
                "You do not have permissions to access the file you provided.",
                "Make sure that you have permissions to access the file.",
                e,
            ),
            std::io::ErrorKind::UnexpectedEof => user_with_internal(
                "The bytecode file ended in the middle of an instruction or constant.",
                "Make sure that the file was produced by the bytecode generator and has not been truncated.",
                e,
            ),
            kind => system_with_internal(
                &format!("We were unable to access the file you provided due to a {} error.", kind),
                "Check the internal error message and try searching for a solution online.",
                e,
            ),
        }
    }
}
