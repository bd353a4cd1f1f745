use flate2::write::GzEncoder;
use liblzma::write::XzEncoder;
use std::io::{Error, Write};

/// Flushes trailing codec data and hands back the wrapped writer.
pub trait Finish<O> {
    fn finish(self) -> Result<O, Error>;
}

impl<W: Write> Finish<W> for XzEncoder<W> {
    fn finish(self) -> Result<W, Error> {
        self.finish()
    }
}

impl<W: Write> Finish<W> for GzEncoder<W> {
    fn finish(self) -> Result<W, Error> {
        self.finish()
    }
}
