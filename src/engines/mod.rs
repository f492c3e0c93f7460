// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 引擎模块
///
/// 实现无头浏览器爬取引擎：页面驱动、预注入探针、
/// 导航失败检测、子页面选择和站点地图抓取
pub mod crawl_engine;
pub mod failure;
pub mod instrumentation;
pub mod page_ranker;
pub mod sitemap;
pub mod types;
