// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Deserialize;
use validator::Validate;

/// 提交分析请求
///
/// url字段缺失由处理器映射为URL_MISSING，不依赖序列化层报错
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnalyzeRequestDto {
    /// 待分析的URL
    #[validate(length(min = 1, max = 2048, message = "url must be between 1 and 2048 characters"))]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_urls() {
        let request = AnalyzeRequestDto {
            url: Some("https://example.com".to_string()),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn rejects_oversized_urls() {
        let request = AnalyzeRequestDto {
            url: Some("x".repeat(2049)),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn rejects_empty_urls() {
        let request = AnalyzeRequestDto {
            url: Some(String::new()),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn missing_url_passes_shape_validation() {
        // 缺失由处理器映射为URL_MISSING
        let request = AnalyzeRequestDto { url: None };
        assert!(request.validate().is_ok());
    }
}
