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

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, EventResponseReceived, EventWebSocketCreated, ResourceType,
    SetBypassServiceWorkerParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engines::failure::NavigationProbe;
use crate::engines::instrumentation::{PROBE_JS, READ_PROBE_JS};
use crate::engines::page_ranker::select_subpages;
use crate::engines::sitemap::fetch_sitemap_urls;
use crate::engines::types::{
    tracking_params_of, CookieRecord, CrawlRecord, EngineError, InlineScript, NetworkRequest,
    PageCapture, ProbeFlags, RedirectHop, StorageEntry,
};

/// 固定桌面User-Agent
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 导航期限
const NAV_TIMEOUT: Duration = Duration::from_secs(25);

/// load事件等待上限
const LOAD_TIMEOUT: Duration = Duration::from_secs(6);

/// JS静置窗口
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// 页面内请求捕获的汇总日志
#[derive(Default)]
struct NetLog {
    requests: Vec<NetworkRequest>,
    redirects: Vec<RedirectHop>,
    websockets: Vec<String>,
    document_status: Option<i64>,
    document_headers: HashMap<String, String>,
}

/// 脚本清单的页面内采集结果
#[derive(Deserialize, Default)]
struct ScriptInventory {
    #[serde(default)]
    external: Vec<String>,
    #[serde(default)]
    inline: Vec<InlineScriptRaw>,
}

#[derive(Deserialize)]
struct InlineScriptRaw {
    length: u64,
    #[serde(rename = "trackerSignature", default)]
    tracker_signature: bool,
}

/// 脚本清单采集JS
const COLLECT_SCRIPTS_JS: &str = r#"
JSON.stringify((() => {
  const TRACKER_SNIPPETS = ['gtag(', 'ga(', 'fbq(', 'dataLayer', '_paq', 'ym(',
                            'mixpanel', 'analytics.track', 'twq(', 'snaptr('];
  const external = [];
  const inline = [];
  for (const s of document.querySelectorAll('script')) {
    if (s.src) {
      external.push(s.src);
    } else {
      const text = s.textContent || '';
      inline.push({
        length: text.length,
        trackerSignature: TRACKER_SNIPPETS.some((t) => text.includes(t)),
      });
    }
  }
  return { external, inline };
})())
"#;

/// 内链采集JS
const COLLECT_LINKS_JS: &str = r#"
JSON.stringify(Array.from(document.querySelectorAll('a[href]'))
  .map((a) => a.href)
  .filter((h) => typeof h === 'string' && h.startsWith('http'))
  .slice(0, 500))
"#;

/// 存储快照采集JS（值截断至200字符）
const COLLECT_STORAGE_JS: &str = r#"
JSON.stringify((() => {
  const out = [];
  const grab = (scope, store) => {
    try {
      for (let i = 0; i < store.length && i < 50; i++) {
        const key = store.key(i);
        const value = String(store.getItem(key) || '');
        out.push({ scope, key, value: value.slice(0, 200) });
      }
    } catch (e) { /* storage may be disabled */ }
  };
  grab('local', window.localStorage);
  grab('session', window.sessionStorage);
  return out;
})())
"#;

/// 正文前5000字符采集JS
const BODY_TEXT_JS: &str =
    "(document.body && document.body.innerText ? document.body.innerText : '').slice(0, 5000)";

/// 爬取引擎
///
/// 每次爬取使用独立的浏览器实例，保证任务之间的Cookie隔离。
/// 页面驱动顺序执行：首页 → 站点地图 → 至多3个子页面。
pub struct CrawlEngine;

impl CrawlEngine {
    /// 创建新的爬取引擎实例
    pub fn new() -> Self {
        Self
    }

    /// 爬取目标站点并返回聚合产物
    ///
    /// # 参数
    ///
    /// * `target_url` - 规范化后的目标URL
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlRecord)` - 聚合爬取产物
    /// * `Err(EngineError)` - 首页不可达或浏览器驱动失败
    pub async fn crawl(&self, target_url: &str) -> Result<CrawlRecord, EngineError> {
        let (mut browser, handler_task) = launch_browser().await?;

        let result = self.crawl_with_browser(&browser, target_url).await;

        if let Err(e) = browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        handler_task.abort();

        result
    }

    async fn crawl_with_browser(
        &self,
        browser: &Browser,
        target_url: &str,
    ) -> Result<CrawlRecord, EngineError> {
        // 首页失败对整个任务是致命的
        let (homepage, mut cookies) = drive_page(browser, target_url, true).await?;
        let final_url = homepage.url.clone();

        info!(
            "Homepage captured: {} requests, {} scripts",
            homepage.requests.len(),
            homepage.external_scripts.len()
        );

        // 站点地图与内链的并集作为子页面候选
        let mut candidates = fetch_sitemap_urls(&final_url).await;
        candidates.extend(homepage.internal_links.iter().cloned());

        let subpage_urls = select_subpages(&final_url, &candidates);
        debug!("Selected {} sub-pages", subpage_urls.len());

        let mut pages = vec![homepage];

        for sub_url in subpage_urls {
            match drive_page(browser, &sub_url, false).await {
                Ok((capture, sub_cookies)) => {
                    cookies.extend(sub_cookies);
                    pages.push(capture);
                }
                Err(e) => {
                    // 子页面失败只记录不致命
                    warn!("Sub-page {} skipped: {}", sub_url, e);
                }
            }
        }

        let is_https = final_url.starts_with("https:");

        Ok(CrawlRecord {
            target_url: target_url.to_string(),
            final_url,
            is_https,
            pages,
            cookies: dedup_cookies(cookies),
        })
    }
}

impl Default for CrawlEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 启动独立浏览器实例
async fn launch_browser() -> Result<(Browser, JoinHandle<()>), EngineError> {
    let config = BrowserConfig::builder()
        .no_sandbox()
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg(format!("--user-agent={}", USER_AGENT))
        .request_timeout(Duration::from_secs(30))
        .build()
        .map_err(EngineError::Browser)?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| EngineError::Browser(e.to_string()))?;

    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    Ok((browser, handler_task))
}

/// 驱动单个页面并采集产物
///
/// 首页按1信号阈值硬失败；子页面放宽到2信号。
/// 任何在稳定前发生的驱动异常立即视为不可达。
async fn drive_page(
    browser: &Browser,
    url: &str,
    is_homepage: bool,
) -> Result<(PageCapture, Vec<CookieRecord>), EngineError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| EngineError::Browser(e.to_string()))?;

    let capture_result = drive_page_inner(&page, url, is_homepage).await;

    if let Err(e) = page.close().await {
        debug!("Page close failed: {}", e);
    }

    capture_result
}

async fn drive_page_inner(
    page: &Page,
    url: &str,
    is_homepage: bool,
) -> Result<(PageCapture, Vec<CookieRecord>), EngineError> {
    page.execute(SetUserAgentOverrideParams::new(USER_AGENT.to_string()))
        .await
        .map_err(|e| EngineError::Browser(e.to_string()))?;

    // Service Worker在上下文层面旁路，避免缓存污染请求捕获
    page.execute(SetBypassServiceWorkerParams::new(true))
        .await
        .map_err(|e| EngineError::Browser(e.to_string()))?;

    // 探针必须先于任何页面脚本运行
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(PROBE_JS))
        .await
        .map_err(|e| EngineError::Browser(e.to_string()))?;

    let net_log = Arc::new(Mutex::new(NetLog::default()));
    let collectors = spawn_collectors(page, net_log.clone()).await?;

    // 导航：25秒期限内等待domcontentloaded级别的提交
    let navigation = tokio::time::timeout(NAV_TIMEOUT, page.goto(url)).await;
    let nav_failed = match navigation {
        Err(_) => true,
        Ok(Err(e)) => {
            debug!("Navigation error for {}: {}", url, e);
            true
        }
        Ok(Ok(_)) => false,
    };

    if nav_failed {
        for task in collectors {
            task.abort();
        }
        return Err(EngineError::Unreachable {
            signals: 1,
            url: url.to_string(),
        });
    }

    // load或6秒静置先到者为准，再加2秒JS静置窗口
    let _ = tokio::time::timeout(LOAD_TIMEOUT, page.wait_for_navigation()).await;
    tokio::time::sleep(SETTLE_DELAY).await;

    let final_url = page
        .url()
        .await
        .ok()
        .flatten()
        .map(|u| u.to_string())
        .unwrap_or_else(|| url.to_string());

    let content = page.content().await.unwrap_or_default();

    let (status, response_headers, request_count) = {
        let log = net_log.lock().expect("net log poisoned");
        let non_data_requests = log
            .requests
            .iter()
            .filter(|r| !r.url.starts_with("data:"))
            .count();
        (
            log.document_status,
            log.document_headers.clone(),
            non_data_requests,
        )
    };

    let probe = NavigationProbe {
        status,
        final_url: final_url.clone(),
        request_count,
        content: content.clone(),
    };

    if probe.is_failure(is_homepage) {
        let signals = probe.failure_signals();
        for task in collectors {
            task.abort();
        }
        return Err(EngineError::Unreachable {
            signals,
            url: url.to_string(),
        });
    }

    // 页面内采集：脚本清单、内链、存储、正文、探针标志
    let inventory: ScriptInventory = evaluate_json(page, COLLECT_SCRIPTS_JS)
        .await
        .unwrap_or_default();
    let internal_links: Vec<String> = evaluate_json(page, COLLECT_LINKS_JS)
        .await
        .unwrap_or_default();
    let storage: Vec<StorageEntry> = evaluate_json(page, COLLECT_STORAGE_JS)
        .await
        .unwrap_or_default();
    let probe_flags: ProbeFlags = evaluate_json(page, READ_PROBE_JS).await.unwrap_or_default();

    let body_text = page
        .evaluate(BODY_TEXT_JS.to_string())
        .await
        .ok()
        .and_then(|result| result.into_value::<String>().ok())
        .unwrap_or_default();

    let cookies = page
        .get_cookies()
        .await
        .map(|cookies| cookies.iter().map(to_cookie_record).collect())
        .unwrap_or_else(|e| {
            debug!("Cookie collection failed for {}: {}", url, e);
            Vec::new()
        });

    for task in collectors {
        task.abort();
    }

    let log = net_log.lock().expect("net log poisoned");
    let capture = PageCapture {
        url: final_url,
        status,
        requests: log.requests.clone(),
        response_headers,
        redirects: log.redirects.clone(),
        websocket_urls: log.websockets.clone(),
        external_scripts: inventory.external,
        inline_scripts: inventory
            .inline
            .into_iter()
            .map(|raw| InlineScript {
                length: raw.length,
                tracker_signature: raw.tracker_signature,
            })
            .collect(),
        storage,
        internal_links,
        body_text,
        probe: probe_flags,
    };

    Ok((capture, cookies))
}

/// 注册CDP网络事件收集器
async fn spawn_collectors(
    page: &Page,
    net_log: Arc<Mutex<NetLog>>,
) -> Result<Vec<JoinHandle<()>>, EngineError> {
    let mut request_events = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(|e| EngineError::Browser(e.to_string()))?;
    let mut response_events = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| EngineError::Browser(e.to_string()))?;
    let mut websocket_events = page
        .event_listener::<EventWebSocketCreated>()
        .await
        .map_err(|e| EngineError::Browser(e.to_string()))?;

    let log = net_log.clone();
    let request_task = tokio::spawn(async move {
        while let Some(event) = request_events.next().await {
            let mut log = log.lock().expect("net log poisoned");

            if let Some(redirect) = &event.redirect_response {
                log.redirects.push(RedirectHop {
                    from: redirect.url.clone(),
                    to: event.request.url.clone(),
                    status: redirect.status,
                });
            }

            let resource_type = event
                .r#type
                .as_ref()
                .map(|t| format!("{:?}", t).to_ascii_lowercase())
                .unwrap_or_else(|| "other".to_string());

            log.requests.push(NetworkRequest {
                url: event.request.url.clone(),
                method: event.request.method.clone(),
                resource_type,
                tracking_params: tracking_params_of(&event.request.url),
                has_post_data: event.request.has_post_data.unwrap_or(false),
            });
        }
    });

    let log = net_log.clone();
    let response_task = tokio::spawn(async move {
        while let Some(event) = response_events.next().await {
            if event.r#type != ResourceType::Document {
                continue;
            }

            let mut log = log.lock().expect("net log poisoned");
            // 主文档响应只记录首个，iframe的Document响应不覆盖
            if log.document_status.is_some() {
                continue;
            }

            log.document_status = Some(event.response.status);
            if let Ok(serde_json::Value::Object(headers)) =
                serde_json::to_value(&event.response.headers)
            {
                log.document_headers = headers
                    .into_iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.to_ascii_lowercase(), s.to_string())))
                    .collect();
            }
        }
    });

    let log = net_log;
    let websocket_task = tokio::spawn(async move {
        while let Some(event) = websocket_events.next().await {
            let mut log = log.lock().expect("net log poisoned");
            log.websockets.push(event.url.clone());
        }
    });

    Ok(vec![request_task, response_task, websocket_task])
}

/// 执行返回JSON字符串的页面脚本并反序列化
async fn evaluate_json<T: serde::de::DeserializeOwned>(page: &Page, script: &str) -> Option<T> {
    let raw = page
        .evaluate(script.to_string())
        .await
        .ok()?
        .into_value::<String>()
        .ok()?;
    serde_json::from_str(&raw).ok()
}

/// CDP Cookie转领域记录
fn to_cookie_record(cookie: &chromiumoxide::cdp::browser_protocol::network::Cookie) -> CookieRecord {
    CookieRecord {
        name: cookie.name.clone(),
        value: cookie.value.clone(),
        domain: cookie.domain.clone(),
        path: cookie.path.clone(),
        expires: if cookie.session || cookie.expires <= 0.0 {
            None
        } else {
            Some(cookie.expires)
        },
        secure: cookie.secure,
        http_only: cookie.http_only,
        same_site: cookie
            .same_site
            .as_ref()
            .map(|s| format!("{:?}", s).to_ascii_lowercase()),
    }
}

/// 按（名称，域名）去重Cookie
fn dedup_cookies(cookies: Vec<CookieRecord>) -> Vec<CookieRecord> {
    let mut seen = HashSet::new();
    cookies
        .into_iter()
        .filter(|c| seen.insert((c.name.clone(), c.domain.clone())))
        .collect()
}
