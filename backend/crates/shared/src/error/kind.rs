//! Error Kind - Classification of errors
//!
//! [`ErrorKind`] fixes the HTTP status, the reason phrase and the default
//! machine-readable code of an error in one place.

/// エラー種別
///
/// 認証 API が返しうるステータスのみを列挙します。
///
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// assert_eq!(ErrorKind::TooManyRequests.status_code(), 429);
/// assert_eq!(ErrorKind::TooManyRequests.code(), "TOO_MANY_REQUESTS");
/// assert_eq!(ErrorKind::Conflict.to_string(), "Conflict");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 400 - 入力不正・JSON 不正・無効なリセットトークン
    BadRequest,
    /// 401 - 認証情報またはトークンが無効
    Unauthorized,
    /// 403 - アカウント停止
    Forbidden,
    /// 404 - ログアウト対象のセッションなし
    NotFound,
    /// 408 - リクエスト処理が制限時間を超過
    RequestTimeout,
    /// 409 - メールアドレス重複
    Conflict,
    /// 429 - レート制限超過
    TooManyRequests,
    /// 500 - 内部エラー（詳細はクライアントに返さない）
    InternalServerError,
}

impl ErrorKind {
    /// (status, reason phrase, default code)
    const fn parts(&self) -> (u16, &'static str, &'static str) {
        match self {
            ErrorKind::BadRequest => (400, "Bad Request", "BAD_REQUEST"),
            ErrorKind::Unauthorized => (401, "Unauthorized", "UNAUTHORIZED"),
            ErrorKind::Forbidden => (403, "Forbidden", "FORBIDDEN"),
            ErrorKind::NotFound => (404, "Not Found", "NOT_FOUND"),
            ErrorKind::RequestTimeout => (408, "Request Timeout", "REQUEST_TIMEOUT"),
            ErrorKind::Conflict => (409, "Conflict", "CONFLICT"),
            ErrorKind::TooManyRequests => (429, "Too Many Requests", "TOO_MANY_REQUESTS"),
            ErrorKind::InternalServerError => {
                (500, "Internal Server Error", "INTERNAL_ERROR")
            }
        }
    }

    #[inline]
    pub const fn status_code(&self) -> u16 {
        self.parts().0
    }

    /// HTTP reason phrase
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        self.parts().1
    }

    /// Code used when the error does not carry a more specific one
    #[inline]
    pub const fn code(&self) -> &'static str {
        self.parts().2
    }

    /// 5xx errors are logged at `error` level
    #[inline]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
