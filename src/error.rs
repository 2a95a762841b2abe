use prometrics;
use serde_yaml;
use std::io;
use trackable::error::TrackableError;
use trackable::error::{ErrorKind as TrackableErrorKind, ErrorKindExt};

use crate::protocol::ResultCode;

/// エラーの種類。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The target object lies in a reserved read-only range.
    ReadOnly,

    /// Connection acquisition, send, receive or wait failure.
    ///
    /// All network faults are normalized to this kind so that callers can
    /// apply a uniform retry policy.
    Network,

    /// A replica (or the local store) answered with a non-success result code.
    Remote(ResultCode),

    /// 入力値が不正。
    InvalidInput,

    /// その他のエラー。
    Other,
}
impl TrackableErrorKind for ErrorKind {}

/// クレート固有の`Error`型。
#[derive(Debug, Clone, TrackableError)]
pub struct Error(TrackableError<ErrorKind>);
impl Error {
    /// Returns the wire result code that corresponds to this error.
    pub fn result_code(&self) -> ResultCode {
        match *self.kind() {
            ErrorKind::ReadOnly => ResultCode::ReadOnly,
            ErrorKind::Network => ResultCode::NetworkError,
            ErrorKind::Remote(code) => code,
            ErrorKind::InvalidInput | ErrorKind::Other => ResultCode::Unknown,
        }
    }
}
impl From<ResultCode> for Error {
    fn from(f: ResultCode) -> Self {
        let kind = match f {
            ResultCode::ReadOnly => ErrorKind::ReadOnly,
            ResultCode::NetworkError => ErrorKind::Network,
            code => ErrorKind::Remote(code),
        };
        kind.cause(format!("result={:?}", f)).into()
    }
}
impl From<io::Error> for Error {
    fn from(f: io::Error) -> Self {
        ErrorKind::Other.cause(f).into()
    }
}
impl From<serde_yaml::Error> for Error {
    fn from(f: serde_yaml::Error) -> Self {
        ErrorKind::InvalidInput.cause(f).into()
    }
}
impl From<prometrics::Error> for Error {
    fn from(f: prometrics::Error) -> Self {
        ErrorKind::Other.takes_over(f).into()
    }
}
