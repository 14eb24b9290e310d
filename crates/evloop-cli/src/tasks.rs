// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Demo tasks run by `evloop demo`.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::Duration;

use evloop_rt::{sleep, Coroutine, Outcome, Pending, TaskError};
use tracing::warn;

use crate::output::timestamp;

const READ_CHUNK: usize = 8192;

/// Fibonacci by nested delegation: `fib(n)` awaits `fib(n - 1)`, then
/// `fib(n - 2)`, and completes with their sum.
pub struct Fib {
    n: u64,
    state: FibState,
}

enum FibState {
    Start,
    AwaitFirst,
    AwaitSecond(u64),
    Finished,
}

impl Fib {
    pub fn new(n: u64) -> Self {
        Self {
            n,
            state: FibState::Start,
        }
    }
}

fn child_value(input: Pending<u64>) -> Result<u64, TaskError> {
    input
        .into_value()
        .ok_or_else(|| TaskError::failed("fib child completed without a value"))
}

impl Coroutine<u64> for Fib {
    fn resume(&mut self, input: Pending<u64>) -> Result<Outcome<u64>, TaskError> {
        match self.state {
            FibState::Start if self.n <= 1 => {
                self.state = FibState::Finished;
                Ok(Outcome::done(self.n))
            }
            FibState::Start => {
                self.state = FibState::AwaitFirst;
                Ok(Outcome::await_child(Fib::new(self.n - 1)))
            }
            FibState::AwaitFirst => {
                self.state = FibState::AwaitSecond(child_value(input)?);
                Ok(Outcome::await_child(Fib::new(self.n - 2)))
            }
            FibState::AwaitSecond(a) => {
                let b = child_value(input)?;
                self.state = FibState::Finished;
                let sum = a
                    .checked_add(b)
                    .ok_or_else(|| TaskError::failed(format!("fib({}) overflows u64", self.n)))?;
                Ok(Outcome::done(sum))
            }
            FibState::Finished => Err(TaskError::Exhausted),
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.state, FibState::Finished)
    }

    fn name(&self) -> &str {
        "fib"
    }
}

/// Bare fd used as a wait token, so the reader itself can stay owned.
struct FdToken(RawFd);

impl AsRawFd for FdToken {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// Reads numbers line by line and writes `<ts> fib(n) = v` for each.
///
/// Every line is echoed before it is parsed. Lines that are not a number
/// are logged and skipped. Completes at EOF.
pub struct ReadInput<R, W> {
    source: R,
    token: Rc<FdToken>,
    out: W,
    partial: Vec<u8>,
    lines: VecDeque<String>,
    computing: Option<u64>,
    eof: bool,
    complete: bool,
}

impl<R: Read + AsRawFd, W: Write> ReadInput<R, W> {
    pub fn new(source: R, out: W) -> Self {
        let token = Rc::new(FdToken(source.as_raw_fd()));
        Self {
            source,
            token,
            out,
            partial: Vec::new(),
            lines: VecDeque::new(),
            computing: None,
            eof: false,
            complete: false,
        }
    }

    /// One read; the source was reported readable so this does not block.
    fn fill(&mut self) -> io::Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        let n = match self.source.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(e),
        };
        if n == 0 {
            self.eof = true;
            if !self.partial.is_empty() {
                let rest = std::mem::take(&mut self.partial);
                self.lines.push_back(String::from_utf8_lossy(&rest).into_owned());
            }
            return Ok(());
        }

        self.partial.extend_from_slice(&buf[..n]);
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            self.lines
                .push_back(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        Ok(())
    }

    fn next_step(&mut self) -> Result<Outcome<u64>, TaskError> {
        while let Some(line) = self.lines.pop_front() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            writeln!(self.out, "{}", line)?;
            match line.parse::<u64>() {
                Ok(n) => {
                    self.computing = Some(n);
                    return Ok(Outcome::await_child(Fib::new(n)));
                }
                Err(e) => warn!(input = %line, error = %e, "not a number"),
            }
        }

        if self.eof {
            self.complete = true;
            return Ok(Outcome::Done(None));
        }
        Ok(Outcome::await_resource(self.token.clone()))
    }
}

impl<R: Read + AsRawFd, W: Write> Coroutine<u64> for ReadInput<R, W> {
    fn resume(&mut self, input: Pending<u64>) -> Result<Outcome<u64>, TaskError> {
        if self.complete {
            return Err(TaskError::Exhausted);
        }
        if let Some(n) = self.computing.take() {
            let value = child_value(input)?;
            writeln!(self.out, "{} fib({}) = {}", timestamp(), n, value)?;
            self.out.flush()?;
        } else if input.resource().is_some() {
            self.fill()?;
        }
        self.next_step()
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn name(&self) -> &str {
        "read-input"
    }
}

/// Prints `<ts> interval <secs>` and sleeps, forever.
pub struct Interval<W> {
    period: Duration,
    out: W,
}

impl<W: Write> Interval<W> {
    pub fn new(period: Duration, out: W) -> Self {
        Self { period, out }
    }
}

impl<W: Write> Coroutine<u64> for Interval<W> {
    fn resume(&mut self, _input: Pending<u64>) -> Result<Outcome<u64>, TaskError> {
        writeln!(self.out, "{} interval {}", timestamp(), self.period.as_secs_f64())?;
        self.out.flush()?;
        Ok(Outcome::await_child(sleep::<u64>(self.period)))
    }

    fn name(&self) -> &str {
        "interval"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evloop_rt::{EventLoop, LoopConfig};
    use std::cell::RefCell;
    use std::os::unix::net::UnixStream;

    /// `Write` into a buffer the test can still read after the task is gone.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    fn new_loop() -> EventLoop<u64> {
        EventLoop::new(LoopConfig::busy_poll()).unwrap()
    }

    #[test]
    fn fib_values() {
        for (n, expected) in [(0, 0), (1, 1), (2, 1), (10, 55), (15, 610)] {
            let mut ev = new_loop();
            let out = Rc::new(RefCell::new(None));
            let sink = out.clone();
            let mut fib = Some(Fib::new(n));
            ev.add_task(evloop_rt::from_fn("root", move |input: Pending<u64>| {
                if let Some(fib) = fib.take() {
                    return Ok(Outcome::await_child(fib));
                }
                *sink.borrow_mut() = input.into_value();
                Ok(Outcome::Done(None))
            }))
            .unwrap();
            ev.run_until_idle().unwrap();
            assert_eq!(*out.borrow(), Some(expected), "fib({})", n);
        }
    }

    #[test]
    fn reads_numbers_until_eof() {
        let (reader, mut writer) = UnixStream::pair().unwrap();
        writer.write_all(b"3\n\nabc\n7").unwrap();
        drop(writer);

        let out = SharedBuf::default();
        let mut ev = new_loop();
        ev.add_task(ReadInput::new(reader, out.clone())).unwrap();
        ev.run_until_idle().unwrap();

        let text = out.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "3");
        assert!(lines[1].ends_with(" fib(3) = 2"), "{}", lines[1]);
        assert_eq!(lines[2], "abc");
        assert_eq!(lines[3], "7");
        assert!(lines[4].ends_with(" fib(7) = 13"), "{}", lines[4]);
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn interval_ticks_while_input_waits() {
        let (reader, writer) = UnixStream::pair().unwrap();
        let out = SharedBuf::default();
        let mut ev = new_loop();
        ev.add_task(ReadInput::new(reader, out.clone())).unwrap();
        ev.add_task(Interval::new(Duration::ZERO, out.clone())).unwrap();

        for _ in 0..20 {
            ev.step().unwrap();
        }
        drop(writer);

        let ticks = out.text().lines().filter(|l| l.contains(" interval ")).count();
        assert!(ticks >= 3, "only {} ticks", ticks);
    }
}
