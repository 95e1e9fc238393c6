use std::io::{self, Read, Write};

/// Console device behind the CP/M machine's CONIN/CONOUT ports.
///
/// `read_char` is a blocking read of one character; the whole machine
/// waits on it, exactly like hardware polling a UART. Tests substitute a
/// scripted implementation.
pub trait Console {
    fn read_char(&mut self) -> u8;
    fn write_char(&mut self, ch: u8);
}

/// Production console over the process stdin/stdout, unbuffered.
#[derive(Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_char(&mut self) -> u8 {
        let mut buf = [0u8; 1];
        match io::stdin().read(&mut buf) {
            // EOF and read errors surface as SUB, CP/M's end-of-file mark.
            Ok(0) | Err(_) => 0x1a,
            Ok(_) => buf[0],
        }
    }

    fn write_char(&mut self, ch: u8) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(&[ch]);
        let _ = stdout.flush();
    }
}
