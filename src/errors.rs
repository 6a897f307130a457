use std::fmt;

/// Crate-wide error type.
///
/// The first five variants are the link-registry taxonomy; the remaining ones
/// only occur while the process is starting up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkvaultError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    EmptyResult(String),
    Backend { operation: String, message: String },
    DatabaseConfig(String),
    DatabaseConnection(String),
    Config(String),
}

impl LinkvaultError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            LinkvaultError::Validation(_) => "E001",
            LinkvaultError::NotFound(_) => "E002",
            LinkvaultError::Conflict(_) => "E003",
            LinkvaultError::EmptyResult(_) => "E004",
            LinkvaultError::Backend { .. } => "E005",
            LinkvaultError::DatabaseConfig(_) => "E006",
            LinkvaultError::DatabaseConnection(_) => "E007",
            LinkvaultError::Config(_) => "E008",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            LinkvaultError::Validation(_) => "Validation Error",
            LinkvaultError::NotFound(_) => "Link Not Found",
            LinkvaultError::Conflict(_) => "Conflict Error",
            LinkvaultError::EmptyResult(_) => "Empty Result",
            LinkvaultError::Backend { .. } => "Backend Error",
            LinkvaultError::DatabaseConfig(_) => "Database Configuration Error",
            LinkvaultError::DatabaseConnection(_) => "Database Connection Error",
            LinkvaultError::Config(_) => "Configuration Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            LinkvaultError::Validation(msg)
            | LinkvaultError::NotFound(msg)
            | LinkvaultError::Conflict(msg)
            | LinkvaultError::EmptyResult(msg)
            | LinkvaultError::DatabaseConfig(msg)
            | LinkvaultError::DatabaseConnection(msg)
            | LinkvaultError::Config(msg) => msg,
            LinkvaultError::Backend { message, .. } => message,
        }
    }

    /// Name of the failing storage operation, for backend errors only.
    pub fn operation(&self) -> Option<&str> {
        match self {
            LinkvaultError::Backend { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// Errors the caller caused, as opposed to infrastructure failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LinkvaultError::Validation(_)
                | LinkvaultError::NotFound(_)
                | LinkvaultError::EmptyResult(_)
        )
    }

    /// 格式化为彩色输出（用于 CLI 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.format_detail().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.format_detail())
    }

    fn format_detail(&self) -> String {
        match self {
            LinkvaultError::Backend { operation, message } => {
                format!("[{}] {}", operation, message)
            }
            other => other.message().to_string(),
        }
    }
}

impl fmt::Display for LinkvaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for LinkvaultError {}

// 便捷的构造函数
impl LinkvaultError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::NotFound(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::Conflict(msg.into())
    }

    pub fn empty_result<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::EmptyResult(msg.into())
    }

    /// Wraps an underlying failure together with the operation that hit it.
    pub fn backend<O: Into<String>, E: fmt::Display>(operation: O, cause: E) -> Self {
        LinkvaultError::Backend {
            operation: operation.into(),
            message: cause.to_string(),
        }
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::DatabaseConnection(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        LinkvaultError::Config(msg.into())
    }
}

impl From<sea_orm::DbErr> for LinkvaultError {
    fn from(err: sea_orm::DbErr) -> Self {
        LinkvaultError::backend("database", err)
    }
}

impl From<std::io::Error> for LinkvaultError {
    fn from(err: std::io::Error) -> Self {
        LinkvaultError::backend("file io", err)
    }
}

impl From<serde_json::Error> for LinkvaultError {
    fn from(err: serde_json::Error) -> Self {
        LinkvaultError::backend("serialization", err)
    }
}

pub type Result<T> = std::result::Result<T, LinkvaultError>;
