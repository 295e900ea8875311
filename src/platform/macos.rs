//! macOS platform implementation
//!
//! Process lookups go through `NSRunningApplication`; player-info
//! notifications come from CoreFoundation's distributed notification center.

use super::{Platform, PlayerInfoHandler};
use crate::events::{PlayerInfoEvent, FORWARDED_KEYS};
use crate::util;
use anyhow::{Context, Result};
use core_foundation::base::{CFType, TCFType};
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::string::{CFString, CFStringRef};
use core_foundation_sys::notification_center::{
    CFNotificationCenterAddObserver, CFNotificationCenterGetDistributedCenter,
    CFNotificationCenterRef, CFNotificationCenterRemoveObserver,
    CFNotificationSuspensionBehaviorDeliverImmediately,
};
use log::debug;
use objc2::rc::Retained;
use objc2_app_kit::NSRunningApplication;
use objc2_foundation::{NSArray, NSString};
use std::ffi::c_void;
use std::path::Path;
use std::process::Command;

/// macOS platform implementation
pub struct MacOSPlatform;

impl Platform for MacOSPlatform {
    #[allow(unused_unsafe)]
    fn is_running(bundle_id: &str) -> bool {
        let bundle_id = NSString::from_str(bundle_id);
        let apps: Retained<NSArray<NSRunningApplication>> =
            unsafe { NSRunningApplication::runningApplicationsWithBundleIdentifier(&bundle_id) };
        apps.count() > 0
    }

    fn launch(path: &Path) -> Result<()> {
        let output = util::run_command_with_timeout(
            Command::new("open").arg(path),
            util::DEFAULT_COMMAND_TIMEOUT,
        )
        .with_context(|| format!("Failed to launch {}", path.display()))?;

        if !output.status.success() {
            anyhow::bail!(
                "open {} failed: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn name() -> &'static str {
        "macOS"
    }
}

// ---------------------------------------------------------------------------
// Distributed notifications
// ---------------------------------------------------------------------------

struct ObserverContext {
    handler: PlayerInfoHandler,
}

/// Registration with the distributed notification center.
///
/// Notifications are delivered on the main run loop. The observer is removed
/// when this value is dropped.
pub struct PlayerInfoObserver {
    name: CFString,
    context: *mut ObserverContext,
}

impl PlayerInfoObserver {
    pub fn register(notification: &str, handler: PlayerInfoHandler) -> Result<Self> {
        let name = CFString::new(notification);
        let context = Box::into_raw(Box::new(ObserverContext { handler }));

        // SAFETY: `context` stays alive until `Drop` removes the observer.
        unsafe {
            let center = CFNotificationCenterGetDistributedCenter();
            if center.is_null() {
                drop(Box::from_raw(context));
                anyhow::bail!("Distributed notification center unavailable");
            }
            CFNotificationCenterAddObserver(
                center,
                context.cast_const().cast(),
                on_notification,
                name.as_concrete_TypeRef(),
                std::ptr::null(),
                CFNotificationSuspensionBehaviorDeliverImmediately,
            );
        }

        debug!("Observing distributed notification {notification}");
        Ok(Self { name, context })
    }
}

impl Drop for PlayerInfoObserver {
    fn drop(&mut self) {
        // SAFETY: removes the registration made in `register` before freeing
        // the context it points at.
        unsafe {
            CFNotificationCenterRemoveObserver(
                CFNotificationCenterGetDistributedCenter(),
                self.context.cast_const().cast(),
                self.name.as_concrete_TypeRef(),
                std::ptr::null(),
            );
            drop(Box::from_raw(self.context));
        }
    }
}

extern "C" fn on_notification(
    _center: CFNotificationCenterRef,
    observer: *mut c_void,
    _name: CFStringRef,
    _object: *const c_void,
    user_info: CFDictionaryRef,
) {
    if observer.is_null() || user_info.is_null() {
        return;
    }

    // SAFETY: `observer` is the context registered in `register` and
    // `user_info` is a valid dictionary for the duration of the callback.
    let (context, info) = unsafe {
        (
            &*observer.cast::<ObserverContext>(),
            CFDictionary::<CFString, CFType>::wrap_under_get_rule(user_info),
        )
    };

    for &key in FORWARDED_KEYS {
        let Some(value) = info.find(&CFString::from_static_string(key)) else {
            continue;
        };
        if let Some(text) = value.downcast::<CFString>() {
            (context.handler)(PlayerInfoEvent::new(key, text.to_string()));
        }
    }
}
