// Debug messenger - validation layer output
//
// The messenger listens to verbose, warning and error messages of every type,
// but only reports those at or above a configurable threshold.

use ash::vk;
use std::borrow::Cow;
use std::ffi::{c_void, CStr};

use super::driver::MessengerDesc;

pub const DEBUG_UTILS_EXTENSION: &CStr = ash::ext::debug_utils::NAME;

impl MessengerDesc {
    pub fn new(report_threshold: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        Self {
            severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            report_threshold,
        }
    }
}

/// Build the create info for `desc`.
///
/// The report threshold travels to the callback as the user-data pointer
/// value itself, so nothing has to outlive the messenger.
pub fn messenger_create_info<'a>(desc: &MessengerDesc) -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(desc.severity)
        .message_type(desc.message_type)
        .pfn_user_callback(Some(debug_callback))
        .user_data(desc.report_threshold.as_raw() as usize as *mut c_void)
}

/// Severity bits are ordered VERBOSE < INFO < WARNING < ERROR.
pub fn should_report(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    threshold: vk::DebugUtilsMessageSeverityFlagsEXT,
) -> bool {
    severity.as_raw() >= threshold.as_raw()
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    p_user_data: *mut c_void,
) -> vk::Bool32 {
    let threshold = vk::DebugUtilsMessageSeverityFlagsEXT::from_raw(p_user_data as usize as u32);
    if !should_report(message_severity, threshold) || p_callback_data.is_null() {
        return vk::FALSE;
    }

    let p_message = unsafe { (*p_callback_data).p_message };
    let message = if p_message.is_null() {
        Cow::from("")
    } else {
        unsafe { CStr::from_ptr(p_message) }.to_string_lossy()
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("validation layer: {}", message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("validation layer: {}", message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::info!("validation layer: {}", message);
        }
        _ => {
            log::debug!("validation layer: {}", message);
        }
    }

    // Only layer developers return TRUE
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    type Severity = vk::DebugUtilsMessageSeverityFlagsEXT;

    #[test]
    fn error_threshold_reports_only_errors() {
        assert!(should_report(Severity::ERROR, Severity::ERROR));
        assert!(!should_report(Severity::WARNING, Severity::ERROR));
        assert!(!should_report(Severity::VERBOSE, Severity::ERROR));
    }

    #[test]
    fn verbose_threshold_reports_everything() {
        for severity in [Severity::VERBOSE, Severity::INFO, Severity::WARNING, Severity::ERROR] {
            assert!(should_report(severity, Severity::VERBOSE));
        }
    }

    #[test]
    fn messenger_listens_to_verbose_warning_and_error() {
        let desc = MessengerDesc::new(Severity::ERROR);

        assert!(desc.severity.contains(Severity::VERBOSE | Severity::WARNING | Severity::ERROR));
        assert!(!desc.severity.contains(Severity::INFO));
        assert_eq!(desc.report_threshold, Severity::ERROR);
    }

    #[test]
    fn threshold_round_trips_through_user_data() {
        let info = messenger_create_info(&MessengerDesc::new(Severity::WARNING));

        let threshold = Severity::from_raw(info.p_user_data as usize as u32);
        assert_eq!(threshold, Severity::WARNING);
        assert!(info.pfn_user_callback.is_some());
    }
}
