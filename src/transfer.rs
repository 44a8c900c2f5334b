//! File transfer to the document root.
//!
//! The [`FileTransfer`] trait is the seam between hawk and whatever hosts the
//! published site. It has three operations: connect, upload, and close. An
//! upload names its destination relative to the document root, e.g.
//! `/sitemap.xml` or `/{key}.txt`.
//!
//! The production implementation is [`FtpTransfer`], a blocking FTP session
//! built on `suppaftp`. Tests use the recording mock in [`tests`].

use crate::config::FtpCredential;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use suppaftp::FtpStream;
use suppaftp::types::FileType;
use thiserror::Error;

const DEFAULT_FTP_PORT: u16 = 21;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),
    #[error("FTP credentials are not configured")]
    MissingCredentials,
    #[error("Not connected")]
    NotConnected,
    #[error("Transfer failed: {0}")]
    Failed(String),
}

/// A session against the server hosting the document root.
///
/// Methods take `&self` so one transfer can be shared by the dispatcher and
/// inspected by callers afterwards.
pub trait FileTransfer: Send + Sync {
    /// Open and authenticate the session.
    fn connect(&self) -> Result<(), TransferError>;

    /// Stream `source` to `remote`, replacing any existing file.
    fn upload(&self, source: &mut dyn Read, remote: &str) -> Result<(), TransferError>;

    /// End the session. Closing an unopened session is a no-op.
    fn close(&self) -> Result<(), TransferError>;

    /// Upload a local file.
    fn upload_file(&self, local: &Path, remote: &str) -> Result<(), TransferError> {
        let mut file = File::open(local)?;
        self.upload(&mut file, remote)
    }
}

impl<T: FileTransfer + ?Sized> FileTransfer for Arc<T> {
    fn connect(&self) -> Result<(), TransferError> {
        (**self).connect()
    }

    fn upload(&self, source: &mut dyn Read, remote: &str) -> Result<(), TransferError> {
        (**self).upload(source, remote)
    }

    fn close(&self) -> Result<(), TransferError> {
        (**self).close()
    }
}

/// Run `op` inside a connect/close pair. The session is closed even when
/// `op` fails; the first error wins.
pub fn with_session<T>(
    transfer: &dyn FileTransfer,
    op: impl FnOnce(&dyn FileTransfer) -> Result<T, TransferError>,
) -> Result<T, TransferError> {
    transfer.connect()?;
    let result = op(transfer);
    let closed = transfer.close();
    let value = result?;
    closed?;
    Ok(value)
}

/// Blocking FTP client.
pub struct FtpTransfer {
    credential: FtpCredential,
    stream: Mutex<Option<FtpStream>>,
}

impl FtpTransfer {
    pub fn new(credential: FtpCredential) -> Self {
        Self {
            credential,
            stream: Mutex::new(None),
        }
    }

    fn address(&self) -> String {
        if self.credential.hostname.contains(':') {
            self.credential.hostname.clone()
        } else {
            format!("{}:{}", self.credential.hostname, DEFAULT_FTP_PORT)
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<FtpStream>>, TransferError> {
        self.stream
            .lock()
            .map_err(|_| TransferError::Failed("FTP session lock poisoned".to_string()))
    }
}

impl FileTransfer for FtpTransfer {
    fn connect(&self) -> Result<(), TransferError> {
        if !self.credential.is_complete() {
            return Err(TransferError::MissingCredentials);
        }
        let address = self.address();
        tracing::debug!(%address, user = %self.credential.username, "connecting to FTP server");

        let mut stream = FtpStream::connect(address.as_str())?;
        stream.login(&self.credential.username, &self.credential.password)?;
        stream.transfer_type(FileType::Binary)?;
        *self.lock()? = Some(stream);
        Ok(())
    }

    fn upload(&self, source: &mut dyn Read, remote: &str) -> Result<(), TransferError> {
        let mut guard = self.lock()?;
        let stream = guard.as_mut().ok_or(TransferError::NotConnected)?;
        let mut reader = source;
        let bytes = stream.put_file(remote, &mut reader)?;
        tracing::info!(remote, bytes, "uploaded");
        Ok(())
    }

    fn close(&self) -> Result<(), TransferError> {
        if let Some(mut stream) = self.lock()?.take() {
            stream.quit()?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Mock transfer that records operations and the uploaded bytes.
    #[derive(Default)]
    pub struct MockTransfer {
        pub operations: Mutex<Vec<RecordedOp>>,
        /// Fail `connect` with this message when set.
        pub fail_connect: Option<String>,
        /// Fail every `upload` with this message when set.
        pub fail_upload: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Connect,
        Upload { remote: String, content: Vec<u8> },
        Close,
    }

    impl MockTransfer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_upload(message: &str) -> Self {
            Self {
                fail_upload: Some(message.to_string()),
                ..Self::default()
            }
        }

        pub fn failing_connect(message: &str) -> Self {
            Self {
                fail_connect: Some(message.to_string()),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Content of the last upload to `remote`, as text.
        pub fn uploaded(&self, remote: &str) -> Option<String> {
            self.get_operations().into_iter().rev().find_map(|op| match op {
                RecordedOp::Upload { remote: r, content } if r == remote => {
                    Some(String::from_utf8_lossy(&content).into_owned())
                }
                _ => None,
            })
        }

        pub fn upload_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Upload { .. }))
                .count()
        }
    }

    impl FileTransfer for MockTransfer {
        fn connect(&self) -> Result<(), TransferError> {
            self.operations.lock().unwrap().push(RecordedOp::Connect);
            match &self.fail_connect {
                Some(message) => Err(TransferError::Failed(message.clone())),
                None => Ok(()),
            }
        }

        fn upload(&self, source: &mut dyn Read, remote: &str) -> Result<(), TransferError> {
            if let Some(message) = &self.fail_upload {
                return Err(TransferError::Failed(message.clone()));
            }
            let mut content = Vec::new();
            source.read_to_end(&mut content)?;
            self.operations.lock().unwrap().push(RecordedOp::Upload {
                remote: remote.to_string(),
                content,
            });
            Ok(())
        }

        fn close(&self) -> Result<(), TransferError> {
            self.operations.lock().unwrap().push(RecordedOp::Close);
            Ok(())
        }
    }

    // =========================================================================
    // Session handling
    // =========================================================================

    #[test]
    fn with_session_wraps_uploads_in_connect_and_close() {
        let mock = MockTransfer::new();
        with_session(&mock, |t| t.upload(&mut "hello".as_bytes(), "/hello.txt")).unwrap();

        assert_eq!(
            mock.get_operations(),
            vec![
                RecordedOp::Connect,
                RecordedOp::Upload {
                    remote: "/hello.txt".into(),
                    content: b"hello".to_vec(),
                },
                RecordedOp::Close,
            ]
        );
    }

    #[test]
    fn with_session_closes_after_failed_upload() {
        let mock = MockTransfer::failing_upload("550 permission denied");
        let result = with_session(&mock, |t| t.upload(&mut "x".as_bytes(), "/x.txt"));

        assert!(matches!(result, Err(TransferError::Failed(m)) if m.contains("550")));
        assert_eq!(
            mock.get_operations(),
            vec![RecordedOp::Connect, RecordedOp::Close]
        );
    }

    #[test]
    fn with_session_skips_work_when_connect_fails() {
        let mock = MockTransfer::failing_connect("connection refused");
        let result = with_session(&mock, |t| t.upload(&mut "x".as_bytes(), "/x.txt"));

        assert!(result.is_err());
        assert_eq!(mock.get_operations(), vec![RecordedOp::Connect]);
    }

    #[test]
    fn upload_file_streams_local_content() {
        let tmp = tempfile::TempDir::new().unwrap();
        let local = tmp.path().join("sitemap.xml");
        std::fs::write(&local, "<urlset/>").unwrap();

        let mock = MockTransfer::new();
        mock.upload_file(&local, "/sitemap.xml").unwrap();
        assert_eq!(mock.uploaded("/sitemap.xml").as_deref(), Some("<urlset/>"));
    }

    #[test]
    fn shared_transfer_records_through_arc() {
        let mock = Arc::new(MockTransfer::new());
        let shared: Box<dyn FileTransfer> = Box::new(Arc::clone(&mock));
        shared.upload(&mut "k".as_bytes(), "/k.txt").unwrap();
        assert_eq!(mock.upload_count(), 1);
    }

    // =========================================================================
    // FTP client
    // =========================================================================

    #[test]
    fn ftp_requires_credentials() {
        let ftp = FtpTransfer::new(FtpCredential::default());
        assert!(matches!(ftp.connect(), Err(TransferError::MissingCredentials)));
    }

    #[test]
    fn ftp_upload_before_connect_fails() {
        let ftp = FtpTransfer::new(FtpCredential::default());
        let result = ftp.upload(&mut "x".as_bytes(), "/x.txt");
        assert!(matches!(result, Err(TransferError::NotConnected)));
    }

    #[test]
    fn ftp_close_without_session_is_noop() {
        let ftp = FtpTransfer::new(FtpCredential::default());
        assert!(ftp.close().is_ok());
    }

    #[test]
    fn ftp_address_defaults_port() {
        let ftp = FtpTransfer::new(FtpCredential {
            hostname: "ftp.example.com".into(),
            username: "u".into(),
            password: "p".into(),
        });
        assert_eq!(ftp.address(), "ftp.example.com:21");

        let ftp = FtpTransfer::new(FtpCredential {
            hostname: "127.0.0.1:2121".into(),
            ..FtpCredential::default()
        });
        assert_eq!(ftp.address(), "127.0.0.1:2121");
    }
}
