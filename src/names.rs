//! Typed names for events raised by OpenSIPS modules.

/// Error returned when parsing a name that is not a well-known event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEventNameError(pub String);

impl std::fmt::Display for ParseEventNameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown event name: {}", self.0)
    }
}

impl std::error::Error for ParseEventNameError {}

impl From<ParseEventNameError> for crate::DatagramError {
    fn from(err: ParseEventNameError) -> Self {
        crate::DatagramError::parse_error(err.to_string())
    }
}

define_name_enum! {
    error_type: ParseEventNameError,
    /// Events shipped with OpenSIPS core and its stock modules.
    ///
    /// Event names are free-form on the wire (scripts raise their own), so
    /// the server dispatches by string. Use this enum with
    /// [`EventHandlers::on`](crate::EventHandlers::on) or
    /// [`DatagramEvent::event_name`](crate::DatagramEvent::event_name) for the
    /// well-known ones.
    pub enum EventName {
        CoreThreshold => "E_CORE_THRESHOLD",
        CoreShmThreshold => "E_CORE_SHM_THRESHOLD",
        CorePkgThreshold => "E_CORE_PKG_THRESHOLD",
        PikeBlocked => "E_PIKE_BLOCKED",
        UlAorInsert => "E_UL_AOR_INSERT",
        UlAorDelete => "E_UL_AOR_DELETE",
        UlContactInsert => "E_UL_CONTACT_INSERT",
        UlContactDelete => "E_UL_CONTACT_DELETE",
        UlContactUpdate => "E_UL_CONTACT_UPDATE",
        DispatcherStatus => "E_DISPATCHER_STATUS",
        LoadBalancerStatus => "E_LOAD_BALANCER_STATUS",
        DialogStateChanged => "E_DLG_STATE_CHANGED",
        AccCdr => "E_ACC_CDR",
        AccEvent => "E_ACC_EVENT",
        AccMissedEvent => "E_ACC_MISSED_EVENT",
        ScriptEvent => "E_SCRIPT_EVENT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_name() {
        assert_eq!(EventName::AccCdr.to_string(), "E_ACC_CDR");
        assert_eq!(EventName::ScriptEvent.as_str(), "E_SCRIPT_EVENT");
        let n: &str = EventName::PikeBlocked.as_ref();
        assert_eq!(n, "E_PIKE_BLOCKED");
    }

    #[test]
    fn from_str_case_insensitive() {
        assert_eq!("e_acc_cdr".parse::<EventName>(), Ok(EventName::AccCdr));
        assert_eq!(
            "E_DLG_STATE_CHANGED".parse::<EventName>(),
            Ok(EventName::DialogStateChanged)
        );
    }

    #[test]
    fn from_wire_lookup() {
        assert_eq!(
            EventName::from_wire("E_DLG_STATE_CHANGED"),
            Some(EventName::DialogStateChanged)
        );
        assert_eq!(EventName::from_wire("e_pike_blocked"), Some(EventName::PikeBlocked));
        assert_eq!(EventName::from_wire("E_NOT_BUILTIN"), None);
    }

    #[test]
    fn from_str_unknown() {
        let err = "E_MY_CUSTOM"
            .parse::<EventName>()
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown event name: E_MY_CUSTOM");
        let err: crate::DatagramError = err.into();
        assert!(matches!(err, crate::DatagramError::Parse { .. }));
    }

    #[test]
    fn round_trip_all_variants() {
        for v in EventName::all() {
            let wire = v.to_string();
            let parsed: EventName = wire
                .parse()
                .unwrap();
            assert_eq!(parsed, *v, "round-trip failed for {wire}");
        }
    }
}
