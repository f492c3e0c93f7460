// Copyright (c) 2025 scanrs contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 预注入指纹探针
//!
//! 在任何页面脚本运行之前注入，对指纹采集相关的浏览器API打补丁。
//! 所有补丁通过委托保留原始行为，只在页面状态对象上记录标志，
//! 不改变被观测代码能看到的返回值。

/// 探针状态对象在页面里的挂载名
pub const PROBE_STATE_NAME: &str = "__scanrs_probe";

/// 注入脚本
///
/// 打补丁的API与记录的标志：
/// - canvas `toDataURL` / `getImageData`   → canvasFingerprint
/// - `getContext('webgl'|'webgl2'|'experimental-webgl')` → webglFingerprint
/// - `document.fonts.check`                → fontFingerprint
/// - document/window 上的全局键盘监听       → keylogger
/// - `HTMLInputElement.value` getter       → formSnooping
/// - `navigator.sendBeacon`                → beacons（有界列表）
/// - `navigator.serviceWorker.register`    → serviceWorker
pub const PROBE_JS: &str = r#"
(() => {
  if (window.__scanrs_probe) { return; }

  const state = {
    canvasFingerprint: false,
    webglFingerprint: false,
    fontFingerprint: false,
    keylogger: false,
    formSnooping: false,
    beacons: [],
    serviceWorker: false,
  };
  Object.defineProperty(window, '__scanrs_probe', { value: state, writable: false });

  const MAX_BEACONS = 25;

  try {
    const origToDataURL = HTMLCanvasElement.prototype.toDataURL;
    HTMLCanvasElement.prototype.toDataURL = function (...args) {
      state.canvasFingerprint = true;
      return origToDataURL.apply(this, args);
    };
  } catch (e) { /* ignore */ }

  try {
    const origGetImageData = CanvasRenderingContext2D.prototype.getImageData;
    CanvasRenderingContext2D.prototype.getImageData = function (...args) {
      state.canvasFingerprint = true;
      return origGetImageData.apply(this, args);
    };
  } catch (e) { /* ignore */ }

  try {
    const origGetContext = HTMLCanvasElement.prototype.getContext;
    HTMLCanvasElement.prototype.getContext = function (kind, ...args) {
      if (kind === 'webgl' || kind === 'webgl2' || kind === 'experimental-webgl') {
        state.webglFingerprint = true;
      }
      return origGetContext.call(this, kind, ...args);
    };
  } catch (e) { /* ignore */ }

  try {
    if (document.fonts && document.fonts.check) {
      const origCheck = document.fonts.check.bind(document.fonts);
      document.fonts.check = function (...args) {
        state.fontFingerprint = true;
        return origCheck(...args);
      };
    }
  } catch (e) { /* ignore */ }

  const KEY_EVENTS = ['keydown', 'keypress', 'keyup'];
  const patchListener = (target) => {
    const orig = target.addEventListener;
    target.addEventListener = function (type, ...rest) {
      if (KEY_EVENTS.includes(type)) {
        state.keylogger = true;
      }
      return orig.call(this, type, ...rest);
    };
  };
  try { patchListener(document); } catch (e) { /* ignore */ }
  try { patchListener(window); } catch (e) { /* ignore */ }

  try {
    const desc = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value');
    if (desc && desc.get) {
      Object.defineProperty(HTMLInputElement.prototype, 'value', {
        get() {
          state.formSnooping = true;
          return desc.get.call(this);
        },
        set(v) {
          return desc.set.call(this, v);
        },
        configurable: true,
      });
    }
  } catch (e) { /* ignore */ }

  try {
    const origSendBeacon = navigator.sendBeacon ? navigator.sendBeacon.bind(navigator) : null;
    if (origSendBeacon) {
      navigator.sendBeacon = function (url, data) {
        if (state.beacons.length < MAX_BEACONS) {
          state.beacons.push({ url: String(url), hasData: data !== undefined && data !== null });
        }
        return origSendBeacon(url, data);
      };
    }
  } catch (e) { /* ignore */ }

  try {
    if (navigator.serviceWorker && navigator.serviceWorker.register) {
      const origRegister = navigator.serviceWorker.register.bind(navigator.serviceWorker);
      navigator.serviceWorker.register = function (...args) {
        state.serviceWorker = true;
        return origRegister(...args);
      };
    }
  } catch (e) { /* ignore */ }
})();
"#;

/// 读取探针状态的表达式
///
/// 序列化为JSON字符串，页面未注入时返回空对象
pub const READ_PROBE_JS: &str =
    "JSON.stringify(window.__scanrs_probe ? window.__scanrs_probe : {})";
