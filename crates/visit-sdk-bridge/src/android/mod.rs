// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android device facts and session storage via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Health Connect itself is not reached from
// here: the host app implements `HealthConnectProvider` on top of the
// Health Connect SDK and feeds its callbacks into the `EventSink`.

#![cfg(target_os = "android")]

use jni::JNIEnv;
use jni::objects::{JObject, JString, JValue};

use visit_sdk_core::error::{BridgeError, Result};

use crate::traits::{DeviceInfo, SessionStorage};

/// `BatteryManager.BATTERY_PROPERTY_CAPACITY`.
const BATTERY_PROPERTY_CAPACITY: i32 = 4;

/// `Context.BATTERY_SERVICE`.
const BATTERY_SERVICE: &str = "batterymanager";

/// SharedPreferences file holding the session flags.
const PREFS_FILE: &str = "visit_session";

const KEY_PREVIOUSLY_REVOKED: &str = "previously_revoked";

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Obtain a [`JNIEnv`] handle from the global Android context, attaching
/// the current thread if needed.
fn jni_env() -> Result<JNIEnv<'static>> {
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is guaranteed valid for the lifetime of the process.
    let vm = unsafe { jni::JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| BridgeError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    let env = vm
        .attach_current_thread_permanently()
        .map_err(|e| BridgeError::Bridge(format!("failed to attach JNI thread: {e}")))?;
    // SAFETY: the thread stays attached for the rest of its life, so the raw
    // env pointer outlives the local `JavaVM` wrapper.
    unsafe { JNIEnv::from_raw(env.get_raw()) }
        .map_err(|e| BridgeError::Bridge(format!("invalid JNIEnv: {e}")))
}

/// The hosting `Context` as a [`JObject`].
fn context() -> Result<JObject<'static>> {
    let ptr = ndk_context::android_context().context();
    if ptr.is_null() {
        return Err(BridgeError::Bridge(
            "Android context is null; host activity not initialised".into(),
        ));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting context.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

fn jni_err(context: &str, e: jni::errors::Error) -> BridgeError {
    BridgeError::Bridge(format!("{context}: {e}"))
}

// ---------------------------------------------------------------------------
// DeviceInfo: Build.VERSION / BatteryManager
// ---------------------------------------------------------------------------

/// Android implementation of [`DeviceInfo`]. Zero-sized; every call goes
/// through JNI.
pub struct AndroidDevice;

impl DeviceInfo for AndroidDevice {
    /// `android.os.Build.VERSION.RELEASE`.
    fn os_release(&self) -> Result<String> {
        let mut env = jni_env()?;
        let release: JObject = env
            .get_static_field("android/os/Build$VERSION", "RELEASE", "Ljava/lang/String;")
            .map_err(|e| jni_err("Build.VERSION.RELEASE", e))?
            .l()
            .map_err(|e| jni_err("RELEASE->l", e))?;

        let release: String = env
            .get_string(&JString::from(release))
            .map_err(|e| jni_err("get_string(RELEASE)", e))?
            .into();
        Ok(release)
    }

    /// `BatteryManager.getIntProperty(BATTERY_PROPERTY_CAPACITY)`.
    ///
    /// Devices without a fuel gauge answer `Integer.MIN_VALUE` or `-1`; the
    /// value is passed through and the controller reports it as unavailable.
    fn battery_level(&self) -> Result<i32> {
        let mut env = jni_env()?;
        let context = context()?;

        let j_service: JString = env
            .new_string(BATTERY_SERVICE)
            .map_err(|e| jni_err("new_string(BATTERY_SERVICE)", e))?;

        let manager: JObject = env
            .call_method(
                &context,
                "getSystemService",
                "(Ljava/lang/String;)Ljava/lang/Object;",
                &[JValue::Object(&j_service)],
            )
            .map_err(|e| jni_err("getSystemService(battery)", e))?
            .l()
            .map_err(|e| jni_err("getSystemService->l", e))?;

        if manager.is_null() {
            return Err(BridgeError::Unavailable("BatteryManager service missing".into()));
        }

        let level = env
            .call_method(
                &manager,
                "getIntProperty",
                "(I)I",
                &[JValue::Int(BATTERY_PROPERTY_CAPACITY)],
            )
            .map_err(|e| jni_err("BatteryManager.getIntProperty", e))?
            .i()
            .map_err(|e| jni_err("getIntProperty->i", e))?;

        tracing::debug!(level, "Android: battery capacity read");
        Ok(level)
    }
}

// ---------------------------------------------------------------------------
// SessionStorage: SharedPreferences (MODE_PRIVATE)
// ---------------------------------------------------------------------------

/// Session flags kept in the app's private SharedPreferences.
pub struct AndroidSessionStorage;

impl SessionStorage for AndroidSessionStorage {
    /// Missing or unreadable preferences read as "not revoked".
    fn previously_revoked(&self) -> bool {
        match read_flag(KEY_PREVIOUSLY_REVOKED) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "Android: could not read session flag");
                false
            }
        }
    }

    fn set_previously_revoked(&self, revoked: bool) -> Result<()> {
        let mut env = jni_env()?;
        let context = context()?;
        let prefs = shared_preferences(&mut env, &context)?;

        let editor: JObject = env
            .call_method(
                &prefs,
                "edit",
                "()Landroid/content/SharedPreferences$Editor;",
                &[],
            )
            .map_err(|e| jni_err("SharedPreferences.edit", e))?
            .l()
            .map_err(|e| jni_err("edit->l", e))?;

        let j_key: JString = env
            .new_string(KEY_PREVIOUSLY_REVOKED)
            .map_err(|e| jni_err("new_string(key)", e))?;

        env.call_method(
            &editor,
            "putBoolean",
            "(Ljava/lang/String;Z)Landroid/content/SharedPreferences$Editor;",
            &[JValue::Object(&j_key), JValue::Bool(u8::from(revoked))],
        )
        .map_err(|e| jni_err("editor.putBoolean", e))?;

        // apply() writes asynchronously and never blocks the caller.
        env.call_method(&editor, "apply", "()V", &[])
            .map_err(|e| jni_err("editor.apply", e))?;

        tracing::info!(revoked, "Android: session flag stored");
        Ok(())
    }
}

fn read_flag(key: &str) -> Result<bool> {
    let mut env = jni_env()?;
    let context = context()?;
    let prefs = shared_preferences(&mut env, &context)?;

    let j_key: JString = env
        .new_string(key)
        .map_err(|e| jni_err("new_string(key)", e))?;

    env.call_method(
        &prefs,
        "getBoolean",
        "(Ljava/lang/String;Z)Z",
        &[JValue::Object(&j_key), JValue::Bool(0)],
    )
    .map_err(|e| jni_err("getBoolean", e))?
    .z()
    .map_err(|e| jni_err("getBoolean->z", e))
}

/// `context.getSharedPreferences("visit_session", MODE_PRIVATE)`.
fn shared_preferences<'a>(env: &mut JNIEnv<'a>, context: &JObject<'_>) -> Result<JObject<'a>> {
    let j_name: JString = env
        .new_string(PREFS_FILE)
        .map_err(|e| jni_err("new_string(prefs_name)", e))?;

    env.call_method(
        context,
        "getSharedPreferences",
        "(Ljava/lang/String;I)Landroid/content/SharedPreferences;",
        &[
            JValue::Object(&j_name),
            JValue::Int(0), // MODE_PRIVATE
        ],
    )
    .map_err(|e| jni_err("getSharedPreferences", e))?
    .l()
    .map_err(|e| jni_err("getSharedPreferences->l", e))
}
