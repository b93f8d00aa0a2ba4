//! C ABI for the SSIMULACRA2 scoring engine.
//!
//! Every scoring function returns the score on success and `-1.0` on
//! failure, and writes the outcome to `*result` when `result` is not NULL.
//! Panics never cross the boundary; they are reported as
//! `SSIMULACRA2_ERROR_UNKNOWN`.
//!
//! Returned strings are owned by the library and must not be freed.
//! Message and version strings are static. Detail and analysis strings live
//! in per-thread buffers that stay valid until the next call of the same
//! function on the same thread.
//!
//! The matching declarations are in `include/ssimulacra2.h`.

#![allow(non_camel_case_types)]

use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::LazyLock;

use ssim2_engine::{
    DEFAULT_BACKGROUND, Error, ImageRole, ResultCode, analyze_image_data,
    compute_from_files_with_background, compute_from_memory_with_background, diagnostics,
};
use tracing::error;

/// Outcome code written through the `result` out-parameter.
pub type ssimulacra2_result = i32;

pub const SSIMULACRA2_OK: ssimulacra2_result = ResultCode::Ok as i32;
pub const SSIMULACRA2_ERROR_INVALID_INPUT: ssimulacra2_result = ResultCode::InvalidInput as i32;
pub const SSIMULACRA2_ERROR_FILE_NOT_FOUND: ssimulacra2_result = ResultCode::FileNotFound as i32;
pub const SSIMULACRA2_ERROR_UNSUPPORTED_FORMAT: ssimulacra2_result =
    ResultCode::UnsupportedFormat as i32;
pub const SSIMULACRA2_ERROR_SIZE_MISMATCH: ssimulacra2_result = ResultCode::SizeMismatch as i32;
pub const SSIMULACRA2_ERROR_TOO_SMALL: ssimulacra2_result = ResultCode::TooSmall as i32;
pub const SSIMULACRA2_ERROR_OUT_OF_MEMORY: ssimulacra2_result = ResultCode::OutOfMemory as i32;
pub const SSIMULACRA2_ERROR_CORRUPT_DATA: ssimulacra2_result = ResultCode::CorruptData as i32;
pub const SSIMULACRA2_ERROR_EMPTY_DATA: ssimulacra2_result = ResultCode::EmptyData as i32;
pub const SSIMULACRA2_ERROR_DECODE_FAILED: ssimulacra2_result = ResultCode::DecodeFailed as i32;
pub const SSIMULACRA2_ERROR_UNKNOWN: ssimulacra2_result = ResultCode::Unknown as i32;

/// Score returned alongside any failure code.
pub const SCORE_ON_ERROR: f64 = -1.0;

static MESSAGES: LazyLock<Vec<(ResultCode, CString)>> = LazyLock::new(|| {
    ResultCode::ALL
        .into_iter()
        .map(|code| (code, to_cstring(code.message())))
        .collect()
});

static VERSION: LazyLock<CString> = LazyLock::new(|| to_cstring(ssim2_engine::VERSION));

const INVALID_CODE: &CStr = c"Invalid error code";

thread_local! {
    static DETAILS: RefCell<CString> = RefCell::new(CString::default());
    static ANALYSIS: RefCell<CString> = RefCell::new(CString::default());
}

fn to_cstring(text: &str) -> CString {
    CString::new(text.replace('\0', " ")).unwrap_or_default()
}

/// Store `text` in a per-thread buffer and return a pointer into it.
fn publish(
    slot: &'static std::thread::LocalKey<RefCell<CString>>,
    text: &str,
) -> *const c_char {
    slot.with(|buf| {
        *buf.borrow_mut() = to_cstring(text);
        buf.borrow().as_ptr()
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Run `f`, turning a panic into [`Error::Unknown`].
fn guarded(f: impl FnOnce() -> ssim2_engine::Result<f64>) -> ssim2_engine::Result<f64> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        error!("panic while scoring: {message}");
        let err = Error::Unknown(format!("panic while scoring: {message}"));
        diagnostics::record(&err);
        Err(err)
    })
}

/// Write the outcome code and return the score or the sentinel.
///
/// # Safety
///
/// `result` must be NULL or valid for a write of one `ssimulacra2_result`.
unsafe fn finish(outcome: ssim2_engine::Result<f64>, result: *mut ssimulacra2_result) -> f64 {
    let (score, code) = match outcome {
        Ok(score) => (score, SSIMULACRA2_OK),
        Err(err) => (SCORE_ON_ERROR, err.code().raw()),
    };
    if !result.is_null() {
        // SAFETY: non-null and writable per the caller contract.
        unsafe { result.write(code) };
    }
    score
}

/// Borrow a NUL-terminated UTF-8 path.
///
/// # Safety
///
/// `ptr` must be NULL or point to a NUL-terminated string that outlives `'a`.
unsafe fn path_arg<'a>(ptr: *const c_char, role: ImageRole) -> ssim2_engine::Result<&'a str> {
    if ptr.is_null() {
        return Err(Error::InvalidInput(format!("{role} path is NULL")));
    }
    // SAFETY: non-null and NUL-terminated per the caller contract.
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|e| Error::InvalidInput(format!("{role} path is not valid UTF-8: {e}")))
}

/// Borrow a caller buffer. A zero length is passed through as empty.
///
/// # Safety
///
/// When `len > 0`, `ptr` must be NULL or valid for reads of `len` bytes for `'a`.
unsafe fn buffer_arg<'a>(ptr: *const u8, len: usize, role: ImageRole) -> ssim2_engine::Result<&'a [u8]> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(Error::InvalidInput(format!("{role} data is NULL with size {len}")));
    }
    // SAFETY: non-null and readable for `len` bytes per the caller contract.
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

unsafe fn score_files(
    original_path: *const c_char,
    distorted_path: *const c_char,
    bg_intensity: f32,
    result: *mut ssimulacra2_result,
) -> f64 {
    let outcome = guarded(|| {
        // SAFETY: forwarded caller contract.
        let original = unsafe { path_arg(original_path, ImageRole::Original) }
            .inspect_err(diagnostics::record)?;
        let distorted = unsafe { path_arg(distorted_path, ImageRole::Distorted) }
            .inspect_err(diagnostics::record)?;
        compute_from_files_with_background(original, distorted, bg_intensity)
    });
    // SAFETY: forwarded caller contract.
    unsafe { finish(outcome, result) }
}

unsafe fn score_memory(
    original_data: *const u8,
    original_size: usize,
    distorted_data: *const u8,
    distorted_size: usize,
    bg_intensity: f32,
    result: *mut ssimulacra2_result,
) -> f64 {
    let outcome = guarded(|| {
        // SAFETY: forwarded caller contract.
        let original = unsafe { buffer_arg(original_data, original_size, ImageRole::Original) }
            .inspect_err(diagnostics::record)?;
        let distorted = unsafe { buffer_arg(distorted_data, distorted_size, ImageRole::Distorted) }
            .inspect_err(diagnostics::record)?;
        compute_from_memory_with_background(original, distorted, bg_intensity)
    });
    // SAFETY: forwarded caller contract.
    unsafe { finish(outcome, result) }
}

/// Score two image files with the default background (0.5).
///
/// # Safety
///
/// Paths must be NULL or NUL-terminated strings. `result` must be NULL or
/// writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ssimulacra2_compute_from_files(
    original_path: *const c_char,
    distorted_path: *const c_char,
    result: *mut ssimulacra2_result,
) -> f64 {
    unsafe { score_files(original_path, distorted_path, DEFAULT_BACKGROUND, result) }
}

/// Score two image files, compositing transparency onto `bg_intensity`.
///
/// # Safety
///
/// Same as [`ssimulacra2_compute_from_files`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ssimulacra2_compute_from_files_with_background(
    original_path: *const c_char,
    distorted_path: *const c_char,
    bg_intensity: f32,
    result: *mut ssimulacra2_result,
) -> f64 {
    unsafe { score_files(original_path, distorted_path, bg_intensity, result) }
}

/// Score two encoded images held in memory with the default background.
///
/// # Safety
///
/// Each buffer must be readable for its size, or the size must be 0.
/// `result` must be NULL or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ssimulacra2_compute_from_memory(
    original_data: *const u8,
    original_size: usize,
    distorted_data: *const u8,
    distorted_size: usize,
    result: *mut ssimulacra2_result,
) -> f64 {
    unsafe {
        score_memory(
            original_data,
            original_size,
            distorted_data,
            distorted_size,
            DEFAULT_BACKGROUND,
            result,
        )
    }
}

/// Score two encoded images held in memory, compositing onto `bg_intensity`.
///
/// # Safety
///
/// Same as [`ssimulacra2_compute_from_memory`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ssimulacra2_compute_from_memory_with_background(
    original_data: *const u8,
    original_size: usize,
    distorted_data: *const u8,
    distorted_size: usize,
    bg_intensity: f32,
    result: *mut ssimulacra2_result,
) -> f64 {
    unsafe {
        score_memory(
            original_data,
            original_size,
            distorted_data,
            distorted_size,
            bg_intensity,
            result,
        )
    }
}

/// Static text for a result code; "Invalid error code" for unknown values.
#[unsafe(no_mangle)]
pub extern "C" fn ssimulacra2_get_error_message(result: ssimulacra2_result) -> *const c_char {
    ResultCode::from_raw(result)
        .and_then(|code| MESSAGES.iter().find(|(c, _)| *c == code))
        .map_or(INVALID_CODE.as_ptr(), |(_, text)| text.as_ptr())
}

/// Static version string.
#[unsafe(no_mangle)]
pub extern "C" fn ssimulacra2_get_version() -> *const c_char {
    VERSION.as_ptr()
}

/// Details of the last failed scoring call on this thread, or "".
#[unsafe(no_mangle)]
pub extern "C" fn ssimulacra2_get_last_error_details() -> *const c_char {
    publish(&DETAILS, &diagnostics::last_error_details())
}

/// Human-readable analysis of an arbitrary buffer. Never fails.
///
/// # Safety
///
/// `data` must be NULL or readable for `size` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ssimulacra2_analyze_image_data(data: *const u8, size: usize) -> *const c_char {
    if data.is_null() || size == 0 {
        return publish(&ANALYSIS, "Error: Data is null or empty");
    }
    let text = catch_unwind(|| {
        // SAFETY: non-null and readable for `size` bytes per the caller contract.
        let bytes = unsafe { std::slice::from_raw_parts(data, size) };
        analyze_image_data(bytes).to_string()
    })
    .unwrap_or_else(|payload| format!("Error: analysis failed: {}", panic_message(payload.as_ref())));
    publish(&ANALYSIS, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::Path;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 9) as u8, (y * 5) as u8, ((x ^ y) * 3) as u8])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn c_path(path: &Path) -> CString {
        CString::new(path.to_str().unwrap()).unwrap()
    }

    fn text(ptr: *const c_char) -> String {
        assert!(!ptr.is_null());
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_owned()
    }

    #[test]
    fn test_version() {
        assert_eq!(text(ssimulacra2_get_version()), "SSIMULACRA 2.1");
    }

    #[test]
    fn test_error_messages() {
        for code in ResultCode::ALL {
            assert_eq!(text(ssimulacra2_get_error_message(code.raw())), code.message());
        }
        assert_eq!(text(ssimulacra2_get_error_message(42)), "Invalid error code");
        assert_eq!(text(ssimulacra2_get_error_message(-10)), "Invalid error code");
    }

    #[test]
    fn test_memory_scoring() {
        let data = png(24, 24);
        let mut result = SSIMULACRA2_ERROR_UNKNOWN;
        let score = unsafe {
            ssimulacra2_compute_from_memory(data.as_ptr(), data.len(), data.as_ptr(), data.len(), &mut result)
        };
        assert_eq!(result, SSIMULACRA2_OK);
        assert!(score >= 90.0, "{score}");
        assert_eq!(text(ssimulacra2_get_last_error_details()), "");
    }

    #[test]
    fn test_file_and_memory_agree() {
        let dir = tempfile::TempDir::new().unwrap();
        let data = png(32, 16);
        let path = dir.path().join("a.png");
        std::fs::write(&path, &data).unwrap();
        let path = c_path(&path);

        let mut file_result = SSIMULACRA2_ERROR_UNKNOWN;
        let mut mem_result = SSIMULACRA2_ERROR_UNKNOWN;
        let from_file = unsafe {
            ssimulacra2_compute_from_files_with_background(path.as_ptr(), path.as_ptr(), 0.3, &mut file_result)
        };
        let from_memory = unsafe {
            ssimulacra2_compute_from_memory_with_background(
                data.as_ptr(),
                data.len(),
                data.as_ptr(),
                data.len(),
                0.3,
                &mut mem_result,
            )
        };
        assert_eq!(file_result, SSIMULACRA2_OK);
        assert_eq!(mem_result, SSIMULACRA2_OK);
        assert!((from_file - from_memory).abs() < 1e-6);
    }

    #[test]
    fn test_null_arguments() {
        let mut result = SSIMULACRA2_OK;
        let score = unsafe { ssimulacra2_compute_from_files(std::ptr::null(), std::ptr::null(), &mut result) };
        assert_eq!(score, SCORE_ON_ERROR);
        assert_eq!(result, SSIMULACRA2_ERROR_INVALID_INPUT);
        assert!(text(ssimulacra2_get_last_error_details()).contains("NULL"));

        let data = png(8, 8);
        let score = unsafe {
            ssimulacra2_compute_from_memory(std::ptr::null(), 10, data.as_ptr(), data.len(), &mut result)
        };
        assert_eq!(score, SCORE_ON_ERROR);
        assert_eq!(result, SSIMULACRA2_ERROR_INVALID_INPUT);
    }

    #[test]
    fn test_null_result_pointer_is_tolerated() {
        let data = png(16, 16);
        let score = unsafe {
            ssimulacra2_compute_from_memory(data.as_ptr(), data.len(), data.as_ptr(), data.len(), std::ptr::null_mut())
        };
        assert!(score > 0.0);

        let score = unsafe {
            ssimulacra2_compute_from_memory(std::ptr::null(), 0, data.as_ptr(), data.len(), std::ptr::null_mut())
        };
        assert_eq!(score, SCORE_ON_ERROR);
    }

    #[test]
    fn test_empty_and_missing() {
        let data = png(16, 16);
        let mut result = SSIMULACRA2_OK;
        unsafe {
            ssimulacra2_compute_from_memory(data.as_ptr(), data.len(), std::ptr::null(), 0, &mut result);
        }
        assert_eq!(result, SSIMULACRA2_ERROR_EMPTY_DATA);
        assert!(text(ssimulacra2_get_last_error_details()).starts_with("Distorted image:"));

        let missing = c_path(Path::new("/no/such/image.png"));
        unsafe {
            ssimulacra2_compute_from_files(missing.as_ptr(), missing.as_ptr(), &mut result);
        }
        assert_eq!(result, SSIMULACRA2_ERROR_FILE_NOT_FOUND);
        assert_eq!(text(ssimulacra2_get_version()), "SSIMULACRA 2.1");
    }

    #[test]
    fn test_background_out_of_range() {
        let mut result = SSIMULACRA2_OK;
        let score = unsafe {
            ssimulacra2_compute_from_memory_with_background(std::ptr::null(), 0, std::ptr::null(), 0, 1.5, &mut result)
        };
        assert_eq!(score, SCORE_ON_ERROR);
        assert_eq!(result, SSIMULACRA2_ERROR_INVALID_INPUT);
    }

    #[test]
    fn test_size_mismatch() {
        let a = png(16, 16);
        let b = png(16, 24);
        let mut result = SSIMULACRA2_OK;
        unsafe {
            ssimulacra2_compute_from_memory(a.as_ptr(), a.len(), b.as_ptr(), b.len(), &mut result);
        }
        assert_eq!(result, SSIMULACRA2_ERROR_SIZE_MISMATCH);
    }

    #[test]
    fn test_analyze() {
        let empty = unsafe { ssimulacra2_analyze_image_data(std::ptr::null(), 0) };
        assert_eq!(text(empty), "Error: Data is null or empty");

        let data = png(20, 10);
        let report = text(unsafe { ssimulacra2_analyze_image_data(data.as_ptr(), data.len()) });
        assert!(report.contains("PNG"), "{report}");
        assert!(report.contains("20x10"), "{report}");

        let junk = b"plain text buffer";
        let report = text(unsafe { ssimulacra2_analyze_image_data(junk.as_ptr(), junk.len()) });
        assert!(report.contains("Unknown/Unsupported"), "{report}");
    }
}
