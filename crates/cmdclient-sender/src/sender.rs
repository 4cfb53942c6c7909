use std::io::{ErrorKind, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cmdclient_frame::{encode_command, Command, FieldKind, FrameConfig};
use tracing::{debug, trace, warn};

use crate::error::{Result, SendError};
use crate::permit::{Permit, PermitGuard, SendLock};

/// Network name used when none is configured.
pub const DEFAULT_SENDER_NAME: &str = "cmdclient";

/// Configuration for a [`GuardedSender`].
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Client network name, recorded in log events.
    pub name: String,
    /// Frame encoding settings.
    pub frame: FrameConfig,
    /// Maximum wait for the permit. `None` waits indefinitely.
    pub acquire_timeout: Option<Duration>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SENDER_NAME.to_string(),
            frame: FrameConfig::default(),
            acquire_timeout: None,
        }
    }
}

/// Writes framed commands to a shared sink, one sender at a time.
///
/// The permit decides who may write. The sink sits behind its own mutex so
/// the sender can be shared by reference across threads; that mutex is
/// uncontended while the permit is honoured.
pub struct GuardedSender<W, P = SendLock> {
    sink: Mutex<W>,
    permit: P,
    config: SenderConfig,
}

impl<W: Write> GuardedSender<W> {
    /// Create a sender with the default permit and configuration.
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, SenderConfig::default())
    }

    /// Create a sender with the default permit and explicit configuration.
    pub fn with_config(sink: W, config: SenderConfig) -> Self {
        Self::with_permit(sink, SendLock::new(), config)
    }
}

impl<W: Write, P: Permit> GuardedSender<W, P> {
    /// Create a sender around an explicit permit.
    pub fn with_permit(sink: W, permit: P, config: SenderConfig) -> Self {
        Self {
            sink: Mutex::new(sink),
            permit,
            config,
        }
    }

    /// Send one command (blocking).
    ///
    /// Waits for the permit, encodes the command and writes its five fields,
    /// flushing after each. The permit is released before any error is
    /// returned. A failed send is not retried and leaves whatever was
    /// already written in the sink.
    pub fn send(&self, command: &Command) -> Result<()> {
        let _permit = self.acquire()?;

        let encoded = encode_command(command, &self.config.frame)?;
        debug!(
            sender = %self.config.name,
            kind = %command.kind(),
            wire_size = encoded.wire_size(),
            "sending command"
        );

        let mut sink = self.lock_sink();
        for (field, bytes) in encoded.fields() {
            if let Err(err) = write_field(&mut *sink, field, bytes) {
                warn!(
                    sender = %self.config.name,
                    kind = %command.kind(),
                    field = field.name(),
                    error = %err,
                    "command write failed"
                );
                return Err(err);
            }
        }

        Ok(())
    }

    /// Run `f` with exclusive access to the sink, holding the permit.
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut W) -> R) -> Result<R> {
        let _permit = self.acquire()?;
        let mut sink = self.lock_sink();
        Ok(f(&mut *sink))
    }

    /// Client network name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current sender configuration.
    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// The permit guarding the sink.
    pub fn permit(&self) -> &P {
        &self.permit
    }

    /// Permits currently available; 1 whenever no send is in progress.
    pub fn available_permits(&self) -> usize {
        self.permit.available()
    }

    /// Consume the sender and return the sink.
    pub fn into_inner(self) -> W {
        self.sink.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self) -> Result<PermitGuard<'_, P>> {
        match self.config.acquire_timeout {
            None => Ok(PermitGuard::acquire(&self.permit)),
            Some(timeout) => PermitGuard::try_acquire_for(&self.permit, timeout)
                .ok_or(SendError::Timeout(timeout)),
        }
    }

    // A panic inside the sink poisons the mutex; the sink state is undefined
    // after a failed send anyway, so keep using it.
    fn lock_sink(&self) -> MutexGuard<'_, W> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W, P> std::fmt::Debug for GuardedSender<W, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedSender")
            .field("name", &self.config.name)
            .finish_non_exhaustive()
    }
}

/// Write one field in full, then flush.
///
/// Empty fields are still submitted as a single zero-length write.
fn write_field<W: Write + ?Sized>(sink: &mut W, field: FieldKind, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    loop {
        match sink.write(&bytes[offset..]) {
            Ok(0) if offset < bytes.len() => return Err(SendError::ConnectionClosed { field }),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(source) => return Err(SendError::Io { field, source }),
        }
        if offset >= bytes.len() {
            break;
        }
    }

    loop {
        match sink.flush() {
            Ok(()) => break,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(source) => return Err(SendError::Io { field, source }),
        }
    }

    trace!(field = field.name(), len = bytes.len(), "field written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use cmdclient_frame::{AbsentMetadata, CommandKind, FrameError};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum SinkCall {
        Write(Vec<u8>),
        Flush,
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<SinkCall>,
    }

    impl Write for RecordingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.calls.push(SinkCall::Write(buf.to_vec()));
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.calls.push(SinkCall::Flush);
            Ok(())
        }
    }

    /// Fails the `fail_at`-th call (writes and flushes counted together).
    struct FailingSink {
        calls: usize,
        fail_at: usize,
        data: Vec<u8>,
    }

    impl FailingSink {
        fn new(fail_at: usize) -> Self {
            Self {
                calls: 0,
                fail_at,
                data: Vec::new(),
            }
        }

        fn tick(&mut self) -> std::io::Result<()> {
            self.calls += 1;
            if self.calls == self.fail_at {
                return Err(std::io::Error::new(ErrorKind::BrokenPipe, "peer went away"));
            }
            Ok(())
        }
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.tick()?;
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.tick()
        }
    }

    #[derive(Default)]
    struct CountingPermit {
        lock: SendLock,
        acquired: AtomicUsize,
        released: AtomicUsize,
    }

    impl Permit for CountingPermit {
        fn acquire(&self) {
            self.lock.acquire();
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }

        fn try_acquire_for(&self, timeout: Duration) -> bool {
            let ok = self.lock.try_acquire_for(timeout);
            if ok {
                self.acquired.fetch_add(1, Ordering::SeqCst);
            }
            ok
        }

        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
            self.lock.release();
        }

        fn available(&self) -> usize {
            self.lock.available()
        }
    }

    fn user_exit() -> Command {
        Command::new(CommandKind::UserExit).with_address(Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn user_exit_writes_and_flushes_each_field() {
        let sender = GuardedSender::new(RecordingSink::default());

        sender.send(&user_exit()).unwrap();

        let calls = sender.into_inner().calls;
        assert_eq!(
            calls,
            vec![
                SinkCall::Write(vec![0, 0, 0, 0]),
                SinkCall::Flush,
                SinkCall::Write(vec![9, 0, 0, 0]),
                SinkCall::Flush,
                SinkCall::Write(vec![49, 50, 55, 46, 48, 46, 48, 46, 49]),
                SinkCall::Flush,
                SinkCall::Write(vec![2, 0, 0, 0]),
                SinkCall::Flush,
                SinkCall::Write(vec![10, 0]),
                SinkCall::Flush,
            ]
        );
    }

    #[test]
    fn user_exit_into_memory_buffer() {
        let sender = GuardedSender::new(Vec::<u8>::new());

        sender.send(&user_exit()).unwrap();

        let wire = sender.into_inner();
        assert_eq!(
            wire,
            vec![0, 0, 0, 0, 9, 0, 0, 0, 49, 50, 55, 46, 48, 46, 48, 46, 49, 2, 0, 0, 0, 10, 0]
        );
    }

    #[test]
    fn absent_address_still_writes_five_fields() {
        let config = SenderConfig {
            frame: FrameConfig {
                absent_metadata: AbsentMetadata::Empty,
                ..FrameConfig::default()
            },
            ..SenderConfig::default()
        };
        let sender = GuardedSender::with_config(RecordingSink::default(), config);

        sender.send(&Command::new(CommandKind::PcLock)).unwrap();

        let calls = sender.into_inner().calls;
        let writes: Vec<&SinkCall> = calls
            .iter()
            .filter(|call| matches!(call, SinkCall::Write(_)))
            .collect();
        assert_eq!(calls.len(), 10);
        assert_eq!(writes.len(), 5);
        assert_eq!(calls[4], SinkCall::Write(Vec::new()));
        assert_eq!(calls[8], SinkCall::Write(Vec::new()));
    }

    #[test]
    fn network_name_is_exposed() {
        let config = SenderConfig {
            name: "Bogus network name".to_string(),
            ..SenderConfig::default()
        };
        let sender = GuardedSender::with_config(Vec::<u8>::new(), config);
        assert_eq!(sender.name(), "Bogus network name");
        assert_eq!(GuardedSender::new(Vec::<u8>::new()).name(), DEFAULT_SENDER_NAME);
    }

    #[test]
    fn permit_restored_after_success() {
        let sender = GuardedSender::new(Vec::<u8>::new());
        assert_eq!(sender.available_permits(), 1);

        sender.send(&user_exit()).unwrap();

        assert_eq!(sender.available_permits(), 1);
    }

    #[test]
    fn failure_at_every_step_releases_permit_without_retry() {
        // 5 writes + 5 flushes.
        for fail_at in 1..=10 {
            let sender = GuardedSender::new(FailingSink::new(fail_at));

            let err = sender.send(&user_exit()).unwrap_err();

            let expected_field = FieldKind::ORDER[(fail_at - 1) / 2];
            assert!(
                matches!(&err, SendError::Io { field, source }
                    if *field == expected_field && source.kind() == ErrorKind::BrokenPipe),
                "fail_at {fail_at}: {err}"
            );
            assert_eq!(err.field(), Some(expected_field));
            assert_eq!(sender.available_permits(), 1, "fail_at {fail_at}");
            let sink = sender.into_inner();
            assert_eq!(sink.calls, fail_at, "no retry after failure");
            let written: usize = [4, 4, 9, 4, 2][..fail_at / 2].iter().sum();
            assert_eq!(sink.data.len(), written, "partial frame stays as written");
        }
    }

    #[test]
    fn permit_symmetry_across_mixed_outcomes() {
        let permit = Arc::new(CountingPermit::default());
        let sender = GuardedSender::with_permit(
            FailingSink::new(3),
            Arc::clone(&permit),
            SenderConfig::default(),
        );

        assert!(sender.send(&user_exit()).is_err());
        assert_eq!(permit.available(), 1);
        assert!(sender.send(&user_exit()).is_ok());
        assert_eq!(permit.available(), 1);
        assert!(sender.send(&user_exit()).is_ok());

        assert_eq!(permit.acquired.load(Ordering::SeqCst), 3);
        assert_eq!(permit.released.load(Ordering::SeqCst), 3);
        assert_eq!(sender.available_permits(), 1);
    }

    #[test]
    fn encoding_failure_writes_nothing_and_releases() {
        let config = SenderConfig {
            frame: FrameConfig {
                max_metadata_size: 1,
                ..FrameConfig::default()
            },
            ..SenderConfig::default()
        };
        let sender = GuardedSender::with_config(RecordingSink::default(), config);
        let cmd = Command::new(CommandKind::Message).with_text_metadata("too long");

        let err = sender.send(&cmd).unwrap_err();

        assert!(matches!(
            err,
            SendError::Frame(FrameError::MetadataTooLarge { .. })
        ));
        assert_eq!(sender.available_permits(), 1);
        assert!(sender.into_inner().calls.is_empty());
    }

    #[test]
    fn panic_inside_sink_releases_permit() {
        struct PanickingSink;

        impl Write for PanickingSink {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                panic!("sink exploded");
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sender = GuardedSender::new(PanickingSink);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = sender.send(&user_exit());
        }));

        assert!(result.is_err());
        assert_eq!(sender.available_permits(), 1);
    }

    #[test]
    fn timeout_while_permit_held_elsewhere() {
        let permit = Arc::new(SendLock::new());
        let config = SenderConfig {
            acquire_timeout: Some(Duration::from_millis(20)),
            ..SenderConfig::default()
        };
        let sender =
            GuardedSender::with_permit(RecordingSink::default(), Arc::clone(&permit), config);

        let held = PermitGuard::acquire(&permit);
        let err = sender.send(&user_exit()).unwrap_err();
        assert!(matches!(err, SendError::Timeout(t) if t == Duration::from_millis(20)));
        drop(held);

        sender.send(&user_exit()).unwrap();
        assert_eq!(sender.into_inner().calls.len(), 10);
    }

    #[test]
    fn unbounded_acquire_timeout_sends() {
        let config = SenderConfig {
            acquire_timeout: Some(Duration::MAX),
            ..SenderConfig::default()
        };
        let sender = GuardedSender::with_config(Vec::new(), config);

        sender.send(&user_exit()).unwrap();
        assert_eq!(sender.available_permits(), 1);
        assert_eq!(sender.into_inner().len(), 23);
    }

    #[test]
    fn short_writes_are_completed() {
        struct OneByteSink {
            data: Vec<u8>,
        }

        impl Write for OneByteSink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                match buf.first() {
                    Some(byte) => {
                        self.data.push(*byte);
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sender = GuardedSender::new(OneByteSink { data: Vec::new() });
        sender.send(&user_exit()).unwrap();
        assert_eq!(sender.into_inner().data.len(), 23);
    }

    #[test]
    fn interrupted_write_and_flush_are_retried() {
        struct InterruptedOnce {
            write_interrupted: bool,
            flush_interrupted: bool,
            data: Vec<u8>,
        }

        impl Write for InterruptedOnce {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if !self.write_interrupted {
                    self.write_interrupted = true;
                    return Err(std::io::Error::from(ErrorKind::Interrupted));
                }
                self.data.extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                if !self.flush_interrupted {
                    self.flush_interrupted = true;
                    return Err(std::io::Error::from(ErrorKind::Interrupted));
                }
                Ok(())
            }
        }

        let sender = GuardedSender::new(InterruptedOnce {
            write_interrupted: false,
            flush_interrupted: false,
            data: Vec::new(),
        });
        sender.send(&user_exit()).unwrap();
        assert_eq!(sender.into_inner().data.len(), 23);
    }

    #[test]
    fn zero_length_write_reports_closed_connection() {
        struct ZeroWriter;

        impl Write for ZeroWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sender = GuardedSender::new(ZeroWriter);
        let err = sender.send(&user_exit()).unwrap_err();
        assert!(matches!(
            err,
            SendError::ConnectionClosed {
                field: FieldKind::Kind
            }
        ));
        assert_eq!(sender.available_permits(), 1);
    }

    #[test]
    fn with_sink_holds_the_permit() {
        let sender = GuardedSender::new(Vec::<u8>::new());
        sender.send(&user_exit()).unwrap();

        let (len, available) = sender
            .with_sink(|sink| (sink.len(), sender.available_permits()))
            .unwrap();
        assert_eq!(len, 23);
        assert_eq!(available, 0);
        assert_eq!(sender.available_permits(), 1);
    }
}
