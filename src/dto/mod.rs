//! DTOs de la API
//!
//! Formas JSON de entrada y salida, y el sobre común `ApiResponse`.

pub mod reservation_dto;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            warnings: Vec::new(),
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            message: Some(message),
            ..Self::success(data)
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}
