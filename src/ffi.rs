//! FFI bindings for Prompt Trajectory
//!
//! This module provides C-compatible functions for calling the analysis engine
//! from other languages. All functions use C strings (null-terminated) and
//! return allocated memory that must be freed by the caller using
//! `trajectory_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::annotate::annotate;
use crate::pipeline::{prompts_to_report, TrajectoryProcessor};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze prompt rows (JSON array or NDJSON) and return the report JSON.
///
/// # Safety
/// - `rows` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `trajectory_free_string`.
/// - Returns NULL on error; call `trajectory_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn trajectory_analyze(rows: *const c_char) -> *mut c_char {
    clear_last_error();

    let rows_str = match cstr_to_string(rows) {
        Some(s) => s,
        None => {
            set_last_error("Invalid rows string pointer");
            return ptr::null_mut();
        }
    };

    match prompts_to_report(&rows_str) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Annotate a single prompt and return the annotation JSON.
///
/// # Safety
/// - `text` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `trajectory_free_string`.
/// - Returns NULL on error; call `trajectory_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn trajectory_annotate(text: *const c_char) -> *mut c_char {
    clear_last_error();

    let text_str = match cstr_to_string(text) {
        Some(s) => s,
        None => {
            set_last_error("Invalid text string pointer");
            return ptr::null_mut();
        }
    };

    match serde_json::to_string(&annotate(&text_str)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a TrajectoryProcessor
pub struct TrajectoryProcessorHandle {
    processor: TrajectoryProcessor,
}

/// Create a new TrajectoryProcessor with the default configuration.
///
/// # Safety
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `trajectory_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn trajectory_processor_new() -> *mut TrajectoryProcessorHandle {
    clear_last_error();

    let handle = Box::new(TrajectoryProcessorHandle {
        processor: TrajectoryProcessor::new(),
    });
    Box::into_raw(handle)
}

/// Free a TrajectoryProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `trajectory_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn trajectory_processor_free(processor: *mut TrajectoryProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Load a specificity model artifact into the processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `trajectory_processor_new`.
/// - `model_json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error; call `trajectory_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn trajectory_processor_load_model(
    processor: *mut TrajectoryProcessorHandle,
    model_json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(model_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid model string pointer");
            return -1;
        }
    };

    match handle.processor.load_model(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Analyze prompt rows with a stateful processor, scoring with its model if loaded.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `trajectory_processor_new`.
/// - `rows` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `trajectory_free_string`.
/// - Returns NULL on error; call `trajectory_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn trajectory_processor_analyze(
    processor: *mut TrajectoryProcessorHandle,
    rows: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    let rows_str = match cstr_to_string(rows) {
        Some(s) => s,
        None => {
            set_last_error("Invalid rows string pointer");
            return ptr::null_mut();
        }
    };

    match handle.processor.process(&rows_str) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Score one text with the processor's model.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `trajectory_processor_new`.
/// - `text` must be a valid null-terminated C string.
/// - `out_score` must be a valid, writable pointer.
/// - Returns 0 on success, -1 on error (including when no model is loaded).
#[no_mangle]
pub unsafe extern "C" fn trajectory_processor_score(
    processor: *mut TrajectoryProcessorHandle,
    text: *const c_char,
    out_score: *mut f64,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }
    if out_score.is_null() {
        set_last_error("Null score pointer");
        return -1;
    }

    let handle = &*processor;

    let text_str = match cstr_to_string(text) {
        Some(s) => s,
        None => {
            set_last_error("Invalid text string pointer");
            return -1;
        }
    };

    match handle.processor.score(&text_str) {
        Ok(score) => {
            *out_score = score;
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by trajectory functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a trajectory function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn trajectory_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next trajectory call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn trajectory_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn trajectory_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Prompt;
    use std::ffi::CString;

    fn sample_rows() -> CString {
        CString::new(
            r#"[
                {"conversation_id": "s1", "sequence_key": 0, "text": "write a draft"},
                {"conversation_id": "s1", "sequence_key": 1, "text": "maybe make it shorter"}
            ]"#,
        )
        .unwrap()
    }

    fn trained_model_json() -> CString {
        let prompts: Vec<Prompt> = [
            "write a draft",
            "make it shorter",
            "you must include a table: columns for name and price",
            "fix the intro",
            "draft a formal, concise cover letter; avoid jargon",
            "explain why",
            "brainstorm alternatives",
            "keep it within 200 words",
            "thanks",
            "rewrite the second paragraph so it is more persuasive",
        ]
        .iter()
        .enumerate()
        .map(|(i, text)| Prompt::new("c", Some(i as u64), *text))
        .collect();

        let mut processor = TrajectoryProcessor::new();
        processor.train(prompts).unwrap();
        CString::new(processor.save_model().unwrap()).unwrap()
    }

    #[test]
    fn test_ffi_analyze() {
        let rows = sample_rows();

        unsafe {
            let result = trajectory_analyze(rows.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("\"trajectories\""));
            assert!(result_str.contains("delegation_generate"));

            trajectory_free_string(result);
        }
    }

    #[test]
    fn test_ffi_annotate() {
        let text = CString::new("maybe you decide, clearly this works").unwrap();

        unsafe {
            let result = trajectory_annotate(text.as_ptr());
            assert!(!result.is_null());

            let json: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(json["hedging"], true);
            assert_eq!(json["certainty"], true);
            assert_eq!(json["authority_transfer"], true);

            trajectory_free_string(result);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let processor = trajectory_processor_new();
            assert!(!processor.is_null());

            let text = CString::new("write a formal letter").unwrap();
            let mut score = 0.0;
            assert_eq!(
                trajectory_processor_score(processor, text.as_ptr(), &mut score),
                -1
            );
            assert!(!trajectory_last_error().is_null());

            let model = trained_model_json();
            assert_eq!(trajectory_processor_load_model(processor, model.as_ptr()), 0);
            assert_eq!(
                trajectory_processor_score(processor, text.as_ptr(), &mut score),
                0
            );
            assert!(score.is_finite());

            let rows = sample_rows();
            let result = trajectory_processor_analyze(processor, rows.as_ptr());
            assert!(!result.is_null());
            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("specificity_pred"));
            trajectory_free_string(result);

            trajectory_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_corrupt_model_is_rejected() {
        let mut artifact: serde_json::Value =
            serde_json::from_str(trained_model_json().to_str().unwrap()).unwrap();
        artifact["vectorizer"]["idf"] = serde_json::json!([1.0]);
        let corrupt = CString::new(artifact.to_string()).unwrap();

        unsafe {
            let processor = trajectory_processor_new();
            assert_eq!(trajectory_processor_load_model(processor, corrupt.as_ptr()), -1);
            assert!(!trajectory_last_error().is_null());

            let text = CString::new("write a formal letter").unwrap();
            let mut score = 0.0;
            assert_eq!(
                trajectory_processor_score(processor, text.as_ptr(), &mut score),
                -1
            );

            trajectory_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid = CString::new("{not json").unwrap();
            let result = trajectory_analyze(invalid.as_ptr());
            assert!(result.is_null());

            let error = trajectory_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            assert!(trajectory_analyze(ptr::null()).is_null());
            assert_eq!(
                trajectory_processor_load_model(ptr::null_mut(), invalid.as_ptr()),
                -1
            );
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = trajectory_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, crate::VERSION);
        }
    }
}
