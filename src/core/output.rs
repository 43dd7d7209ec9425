use std::{rc::Rc, sync::RwLock};

/// An `io::Write` implementation which appends everything it receives to a
/// shared string buffer, letting tests capture what the virtual machine prints.
#[derive(Debug, Clone, Default)]
pub struct CaptureOutput {
    buffer: Rc<RwLock<String>>,
}

impl std::io::Write for CaptureOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let s = std::str::from_utf8(buf).unwrap();
        *self.buffer.write().unwrap() += s;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Display for CaptureOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.buffer.read().unwrap())
    }
}
