use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortenerError {
    ClientInput(String),
    NotFound(String),
    Deleted(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Serialization(String),
    Crypto(String),
    Timeout(String),
    Internal(String),
}

impl ShortenerError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ShortenerError::ClientInput(_) => "E001",
            ShortenerError::NotFound(_) => "E002",
            ShortenerError::Deleted(_) => "E003",
            ShortenerError::DatabaseConfig(_) => "E004",
            ShortenerError::DatabaseConnection(_) => "E005",
            ShortenerError::DatabaseOperation(_) => "E006",
            ShortenerError::FileOperation(_) => "E007",
            ShortenerError::Serialization(_) => "E008",
            ShortenerError::Crypto(_) => "E009",
            ShortenerError::Timeout(_) => "E010",
            ShortenerError::Internal(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ShortenerError::ClientInput(_) => "Client Input Error",
            ShortenerError::NotFound(_) => "Resource Not Found",
            ShortenerError::Deleted(_) => "Resource Deleted",
            ShortenerError::DatabaseConfig(_) => "Database Configuration Error",
            ShortenerError::DatabaseConnection(_) => "Database Connection Error",
            ShortenerError::DatabaseOperation(_) => "Database Operation Error",
            ShortenerError::FileOperation(_) => "File Operation Error",
            ShortenerError::Serialization(_) => "Serialization Error",
            ShortenerError::Crypto(_) => "Crypto Error",
            ShortenerError::Timeout(_) => "Operation Timeout",
            ShortenerError::Internal(_) => "Internal Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ShortenerError::ClientInput(msg)
            | ShortenerError::NotFound(msg)
            | ShortenerError::Deleted(msg)
            | ShortenerError::DatabaseConfig(msg)
            | ShortenerError::DatabaseConnection(msg)
            | ShortenerError::DatabaseOperation(msg)
            | ShortenerError::FileOperation(msg)
            | ShortenerError::Serialization(msg)
            | ShortenerError::Crypto(msg)
            | ShortenerError::Timeout(msg)
            | ShortenerError::Internal(msg) => msg,
        }
    }

    /// 客户端输入错误，永远不应重试
    pub fn is_client_input(&self) -> bool {
        matches!(self, ShortenerError::ClientInput(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ShortenerError::NotFound(_))
    }

    /// 默认的 HTTP 状态码映射，各路由可以按语义覆盖
    #[cfg(feature = "server")]
    pub fn http_status(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ShortenerError::ClientInput(_) => StatusCode::BAD_REQUEST,
            ShortenerError::NotFound(_) => StatusCode::NOT_FOUND,
            ShortenerError::Deleted(_) => StatusCode::GONE,
            ShortenerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 格式化为彩色输出（用于 Server 模式）
    #[cfg(feature = "server")]
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ShortenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ShortenerError {}

// 便捷的构造函数
impl ShortenerError {
    pub fn client_input<T: Into<String>>(msg: T) -> Self {
        ShortenerError::ClientInput(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ShortenerError::NotFound(msg.into())
    }

    pub fn deleted<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Deleted(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        ShortenerError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        ShortenerError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        ShortenerError::FileOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Serialization(msg.into())
    }

    pub fn crypto<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Crypto(msg.into())
    }

    pub fn timeout<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Timeout(msg.into())
    }

    pub fn internal<T: Into<String>>(msg: T) -> Self {
        ShortenerError::Internal(msg.into())
    }
}

impl From<sea_orm::DbErr> for ShortenerError {
    fn from(err: sea_orm::DbErr) -> Self {
        ShortenerError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for ShortenerError {
    fn from(err: std::io::Error) -> Self {
        ShortenerError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for ShortenerError {
    fn from(err: serde_json::Error) -> Self {
        ShortenerError::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for ShortenerError {
    fn from(err: base64::DecodeError) -> Self {
        ShortenerError::ClientInput(format!("base64 解码失败: {}", err))
    }
}

impl From<url::ParseError> for ShortenerError {
    fn from(err: url::ParseError) -> Self {
        ShortenerError::ClientInput(format!("URL 解析失败: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ShortenerError>;
