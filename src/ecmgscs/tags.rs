//! Command tags, parameter tags and error status values of ECMG<=>SCS.

use crate::tlv::Tag;

// Commands
pub const CHANNEL_SETUP: Tag = 0x0001;
pub const CHANNEL_TEST: Tag = 0x0002;
pub const CHANNEL_STATUS: Tag = 0x0003;
pub const CHANNEL_CLOSE: Tag = 0x0004;
pub const CHANNEL_ERROR: Tag = 0x0005;
pub const STREAM_SETUP: Tag = 0x0101;
pub const STREAM_TEST: Tag = 0x0102;
pub const STREAM_STATUS: Tag = 0x0103;
pub const STREAM_CLOSE_REQUEST: Tag = 0x0104;
pub const STREAM_CLOSE_RESPONSE: Tag = 0x0105;
pub const STREAM_ERROR: Tag = 0x0106;
pub const CW_PROVISION: Tag = 0x0201;
pub const ECM_RESPONSE: Tag = 0x0202;

// Parameters
pub const SUPER_CAS_ID: Tag = 0x0001;
pub const SECTION_TSPKT_FLAG: Tag = 0x0002;
pub const DELAY_START: Tag = 0x0003;
pub const DELAY_STOP: Tag = 0x0004;
pub const TRANSITION_DELAY_START: Tag = 0x0005;
pub const TRANSITION_DELAY_STOP: Tag = 0x0006;
pub const ECM_REP_PERIOD: Tag = 0x0007;
pub const MAX_STREAMS: Tag = 0x0008;
pub const MIN_CP_DURATION: Tag = 0x0009;
pub const LEAD_CW: Tag = 0x000A;
pub const CW_PER_MSG: Tag = 0x000B;
pub const MAX_COMP_TIME: Tag = 0x000C;
pub const ACCESS_CRITERIA: Tag = 0x000D;
pub const ECM_CHANNEL_ID: Tag = 0x000E;
pub const ECM_STREAM_ID: Tag = 0x000F;
pub const NOMINAL_CP_DURATION: Tag = 0x0010;
pub const ACCESS_CRITERIA_TRANSFER_MODE: Tag = 0x0011;
pub const CP_NUMBER: Tag = 0x0012;
pub const CP_DURATION: Tag = 0x0013;
pub const CP_CW_COMBINATION: Tag = 0x0014;
pub const ECM_DATAGRAM: Tag = 0x0015;
pub const AC_DELAY_START: Tag = 0x0016;
pub const AC_DELAY_STOP: Tag = 0x0017;
pub const CW_ENCRYPTION: Tag = 0x0018;
pub const ECM_ID: Tag = 0x0019;
pub const ERROR_STATUS: Tag = 0x7000;
pub const ERROR_INFORMATION: Tag = 0x7001;

/// Values of the `error_status` parameter.
pub mod errors {
    pub const INV_MESSAGE: u16 = 0x0001;
    pub const INV_PROTO_VERSION: u16 = 0x0002;
    pub const INV_MESSAGE_TYPE: u16 = 0x0003;
    pub const MESSAGE_TOO_LONG: u16 = 0x0004;
    pub const INV_SUPER_CAS_ID: u16 = 0x0005;
    pub const INV_CHANNEL_ID: u16 = 0x0006;
    pub const INV_STREAM_ID: u16 = 0x0007;
    pub const TOO_MANY_CHANNELS: u16 = 0x0008;
    pub const TOO_MANY_STM_CHAN: u16 = 0x0009;
    pub const TOO_MANY_STM_ECMG: u16 = 0x000A;
    pub const NOT_ENOUGH_CW: u16 = 0x000B;
    pub const OUT_OF_STORAGE: u16 = 0x000C;
    pub const OUT_OF_COMPUTE: u16 = 0x000D;
    pub const INV_PARAM_TYPE: u16 = 0x000E;
    pub const INV_PARAM_LENGTH: u16 = 0x000F;
    pub const MISSING_PARAM: u16 = 0x0010;
    pub const INV_PARAM_VALUE: u16 = 0x0011;
    pub const INV_ECM_ID: u16 = 0x0012;
    pub const CHANNEL_ID_IN_USE: u16 = 0x0013;
    pub const STREAM_ID_IN_USE: u16 = 0x0014;
    pub const ECM_ID_IN_USE: u16 = 0x0015;
    pub const UNKNOWN_ERROR: u16 = 0x7000;
    pub const UNRECOVERABLE_ERROR: u16 = 0x7001;
}

/// Wire name of a command, as used in dumps.
pub fn command_name(tag: Tag) -> &'static str {
    match tag {
        CHANNEL_SETUP => "channel_setup",
        CHANNEL_TEST => "channel_test",
        CHANNEL_STATUS => "channel_status",
        CHANNEL_CLOSE => "channel_close",
        CHANNEL_ERROR => "channel_error",
        STREAM_SETUP => "stream_setup",
        STREAM_TEST => "stream_test",
        STREAM_STATUS => "stream_status",
        STREAM_CLOSE_REQUEST => "stream_close_request",
        STREAM_CLOSE_RESPONSE => "stream_close_response",
        STREAM_ERROR => "stream_error",
        CW_PROVISION => "CW_provision",
        ECM_RESPONSE => "ECM_response",
        _ => "unknown",
    }
}
