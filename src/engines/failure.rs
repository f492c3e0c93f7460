// Copyright 2025 scanrs contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! 导航失败检测
//!
//! 无头浏览器对失败的导航往往"静默成功"：驱动返回页面对象，
//! 内容却是错误页。这里在页面稳定后综合五个独立信号判定失败。

/// 浏览器错误页内容标记
const ERROR_MARKERS: [&str; 11] = [
    "ERR_NAME_NOT_RESOLVED",
    "ERR_CONNECTION_REFUSED",
    "ERR_CONNECTION_TIMED_OUT",
    "ERR_TIMED_OUT",
    "ERR_ADDRESS_UNREACHABLE",
    "ERR_INTERNET_DISCONNECTED",
    "ERR_EMPTY_RESPONSE",
    "chrome-error://",
    "neterror",
    "jserrorpage",
    "dns-not-found",
];

/// 浏览器内部页面的URL前缀
const INTERNAL_URL_SCHEMES: [&str; 3] = ["chrome-error://", "about:", "data:text/html"];

/// 页面稳定后用于失败判定的输入
#[derive(Debug, Clone, Default)]
pub struct NavigationProbe {
    /// 主文档HTTP状态（驱动未返回响应对象时为None）
    pub status: Option<i64>,
    /// 页面最终URL
    pub final_url: String,
    /// 非data-URI请求总数
    pub request_count: usize,
    /// 页面内容（HTML）
    pub content: String,
}

impl NavigationProbe {
    /// 计算命中的失败信号数
    ///
    /// 五个信号相互独立：
    /// 1. 驱动没有返回响应对象
    /// 2. HTTP状态 ≥ 400
    /// 3. 最终URL是浏览器内部页面
    /// 4. 非data-URI请求 ≤ 1（错误页不加载子资源）
    /// 5. 内容包含浏览器错误标记
    pub fn failure_signals(&self) -> usize {
        let mut signals = 0;

        if self.status.is_none() {
            signals += 1;
        }

        if matches!(self.status, Some(status) if status >= 400) {
            signals += 1;
        }

        if INTERNAL_URL_SCHEMES
            .iter()
            .any(|scheme| self.final_url.starts_with(scheme))
        {
            signals += 1;
        }

        if self.request_count <= 1 {
            signals += 1;
        }

        if ERROR_MARKERS
            .iter()
            .any(|marker| self.content.contains(marker))
        {
            signals += 1;
        }

        signals
    }

    /// 按页面角色判定是否失败
    ///
    /// 首页阈值为1个信号；子页面放宽到2个
    pub fn is_failure(&self, is_homepage: bool) -> bool {
        let threshold = if is_homepage { 1 } else { 2 };
        self.failure_signals() >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_probe() -> NavigationProbe {
        NavigationProbe {
            status: Some(200),
            final_url: "https://example.com/".to_string(),
            request_count: 24,
            content: "<html><body>Welcome</body></html>".to_string(),
        }
    }

    #[test]
    fn healthy_page_fires_no_signals() {
        assert_eq!(healthy_probe().failure_signals(), 0);
        assert!(!healthy_probe().is_failure(true));
    }

    #[test]
    fn missing_response_object_is_a_signal() {
        let probe = NavigationProbe {
            status: None,
            ..healthy_probe()
        };
        assert_eq!(probe.failure_signals(), 1);
        assert!(probe.is_failure(true));
        assert!(!probe.is_failure(false));
    }

    #[test]
    fn http_error_status_is_a_signal() {
        let probe = NavigationProbe {
            status: Some(503),
            ..healthy_probe()
        };
        assert_eq!(probe.failure_signals(), 1);
        assert!(probe.is_failure(true));
    }

    #[test]
    fn internal_page_url_is_a_signal() {
        for url in [
            "chrome-error://chromewebdata/",
            "about:blank",
            "data:text/html,oops",
        ] {
            let probe = NavigationProbe {
                final_url: url.to_string(),
                ..healthy_probe()
            };
            assert!(probe.failure_signals() >= 1, "{} should signal", url);
        }
    }

    #[test]
    fn bare_request_count_is_a_signal() {
        let probe = NavigationProbe {
            request_count: 1,
            ..healthy_probe()
        };
        assert_eq!(probe.failure_signals(), 1);
    }

    #[test]
    fn error_marker_in_content_is_a_signal() {
        let probe = NavigationProbe {
            content: "<html>ERR_CONNECTION_REFUSED</html>".to_string(),
            ..healthy_probe()
        };
        assert_eq!(probe.failure_signals(), 1);
    }

    #[test]
    fn subpage_requires_two_signals() {
        // 单信号：子页面不算失败
        let one = NavigationProbe {
            status: Some(404),
            ..healthy_probe()
        };
        assert!(!one.is_failure(false));

        // 双信号：子页面失败
        let two = NavigationProbe {
            status: Some(404),
            request_count: 0,
            ..healthy_probe()
        };
        assert!(two.is_failure(false));
    }

    #[test]
    fn dead_site_fires_multiple_signals() {
        let probe = NavigationProbe {
            status: None,
            final_url: "chrome-error://chromewebdata/".to_string(),
            request_count: 0,
            content: "neterror dns-not-found".to_string(),
        };
        assert_eq!(probe.failure_signals(), 4);
        assert!(probe.is_failure(true));
        assert!(probe.is_failure(false));
    }
}
