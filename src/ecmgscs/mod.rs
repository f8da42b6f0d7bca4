//! DVB SimulCrypt ECMG <=> SCS protocol on top of the generic TLV framework.

mod messages;
pub mod tags;

use std::sync::OnceLock;

use crate::tlv::{
    LengthWidth, MessageFactory, MessagePtr, Protocol, ProtocolHandler, Tag, TlvError, Version,
    build,
};

pub use messages::{
    ChannelClose, ChannelError, ChannelSetup, ChannelStatus, ChannelTest, CpCwCombination,
    CwProvision, EcmResponse, StreamCloseRequest, StreamCloseResponse, StreamError, StreamSetup,
    StreamStatus, StreamTest,
};
use tags::errors;

pub const CURRENT_VERSION: Version = 0x02;

/// Control word size in CP_CW_combination.
pub const CW_BYTES: usize = 8;

pub const PROTOCOL_NAME: &str = "ECMG<=>SCS";

static PROTOCOL: OnceLock<Protocol> = OnceLock::new();

/// Shared schema of the protocol.
pub fn protocol() -> &'static Protocol {
    PROTOCOL.get_or_init(define_protocol)
}

fn define_protocol() -> Protocol {
    use tags::*;

    let mut p = Protocol::new(CURRENT_VERSION, LengthWidth::U16);

    // (command, parameter, min_size, max_size, min_count, max_count)
    p.add(CHANNEL_SETUP, SUPER_CAS_ID, 4, 4, 1, 1);
    p.add(CHANNEL_SETUP, ECM_CHANNEL_ID, 2, 2, 1, 1);

    p.add(CHANNEL_TEST, ECM_CHANNEL_ID, 2, 2, 1, 1);

    p.add(CHANNEL_STATUS, ECM_CHANNEL_ID, 2, 2, 1, 1);
    p.add(CHANNEL_STATUS, SECTION_TSPKT_FLAG, 1, 1, 1, 1);
    p.add(CHANNEL_STATUS, AC_DELAY_START, 2, 2, 0, 1);
    p.add(CHANNEL_STATUS, AC_DELAY_STOP, 2, 2, 0, 1);
    p.add(CHANNEL_STATUS, DELAY_START, 2, 2, 1, 1);
    p.add(CHANNEL_STATUS, DELAY_STOP, 2, 2, 1, 1);
    p.add(CHANNEL_STATUS, TRANSITION_DELAY_START, 2, 2, 0, 1);
    p.add(CHANNEL_STATUS, TRANSITION_DELAY_STOP, 2, 2, 0, 1);
    p.add(CHANNEL_STATUS, ECM_REP_PERIOD, 2, 2, 1, 1);
    p.add(CHANNEL_STATUS, MAX_STREAMS, 2, 2, 1, 1);
    p.add(CHANNEL_STATUS, MIN_CP_DURATION, 2, 2, 1, 1);
    p.add(CHANNEL_STATUS, LEAD_CW, 1, 1, 1, 1);
    p.add(CHANNEL_STATUS, CW_PER_MSG, 1, 1, 1, 1);
    p.add(CHANNEL_STATUS, MAX_COMP_TIME, 2, 2, 1, 1);

    p.add(CHANNEL_CLOSE, ECM_CHANNEL_ID, 2, 2, 1, 1);

    p.add(CHANNEL_ERROR, ECM_CHANNEL_ID, 2, 2, 1, 1);
    p.add(CHANNEL_ERROR, ERROR_STATUS, 2, 2, 1, 0xFFFF);
    p.add(CHANNEL_ERROR, ERROR_INFORMATION, 2, 2, 0, 0xFFFF);

    p.add(STREAM_SETUP, ECM_CHANNEL_ID, 2, 2, 1, 1);
    p.add(STREAM_SETUP, ECM_STREAM_ID, 2, 2, 1, 1);
    p.add(STREAM_SETUP, ECM_ID, 2, 2, 1, 1);
    p.add(STREAM_SETUP, NOMINAL_CP_DURATION, 2, 2, 1, 1);

    p.add(STREAM_TEST, ECM_CHANNEL_ID, 2, 2, 1, 1);
    p.add(STREAM_TEST, ECM_STREAM_ID, 2, 2, 1, 1);

    p.add(STREAM_STATUS, ECM_CHANNEL_ID, 2, 2, 1, 1);
    p.add(STREAM_STATUS, ECM_STREAM_ID, 2, 2, 1, 1);
    p.add(STREAM_STATUS, ECM_ID, 2, 2, 1, 1);
    p.add(STREAM_STATUS, ACCESS_CRITERIA_TRANSFER_MODE, 1, 1, 1, 1);

    p.add(STREAM_CLOSE_REQUEST, ECM_CHANNEL_ID, 2, 2, 1, 1);
    p.add(STREAM_CLOSE_REQUEST, ECM_STREAM_ID, 2, 2, 1, 1);

    p.add(STREAM_CLOSE_RESPONSE, ECM_CHANNEL_ID, 2, 2, 1, 1);
    p.add(STREAM_CLOSE_RESPONSE, ECM_STREAM_ID, 2, 2, 1, 1);

    p.add(STREAM_ERROR, ECM_CHANNEL_ID, 2, 2, 1, 1);
    p.add(STREAM_ERROR, ECM_STREAM_ID, 2, 2, 1, 1);
    p.add(STREAM_ERROR, ERROR_STATUS, 2, 2, 1, 0xFFFF);
    p.add(STREAM_ERROR, ERROR_INFORMATION, 2, 2, 0, 0xFFFF);

    p.add(CW_PROVISION, ECM_CHANNEL_ID, 2, 2, 1, 1);
    p.add(CW_PROVISION, ECM_STREAM_ID, 2, 2, 1, 1);
    p.add(CW_PROVISION, CP_NUMBER, 2, 2, 1, 1);
    p.add(CW_PROVISION, CW_ENCRYPTION, 0, 0xFFFF, 0, 1);
    p.add(CW_PROVISION, CP_CW_COMBINATION, 2 + CW_BYTES, 2 + CW_BYTES, 1, 0xFFFF);
    p.add(CW_PROVISION, CP_DURATION, 2, 2, 0, 1);
    p.add(CW_PROVISION, ACCESS_CRITERIA, 0, 0xFFFF, 0, 1);

    p.add(ECM_RESPONSE, ECM_CHANNEL_ID, 2, 2, 1, 1);
    p.add(ECM_RESPONSE, ECM_STREAM_ID, 2, 2, 1, 1);
    p.add(ECM_RESPONSE, CP_NUMBER, 2, 2, 1, 1);
    p.add(ECM_RESPONSE, ECM_DATAGRAM, 0, 0xFFFF, 1, 1);

    p
}

type Builder = fn(&MessageFactory) -> Result<MessagePtr, TlvError>;

const BUILDERS: &[(Tag, Builder)] = &[
    (tags::CHANNEL_SETUP, build::<ChannelSetup> as Builder),
    (tags::CHANNEL_TEST, build::<ChannelTest> as Builder),
    (tags::CHANNEL_STATUS, build::<ChannelStatus> as Builder),
    (tags::CHANNEL_CLOSE, build::<ChannelClose> as Builder),
    (tags::CHANNEL_ERROR, build::<ChannelError> as Builder),
    (tags::STREAM_SETUP, build::<StreamSetup> as Builder),
    (tags::STREAM_TEST, build::<StreamTest> as Builder),
    (tags::STREAM_STATUS, build::<StreamStatus> as Builder),
    (tags::STREAM_CLOSE_REQUEST, build::<StreamCloseRequest> as Builder),
    (tags::STREAM_CLOSE_RESPONSE, build::<StreamCloseResponse> as Builder),
    (tags::STREAM_ERROR, build::<StreamError> as Builder),
    (tags::CW_PROVISION, build::<CwProvision> as Builder),
    (tags::ECM_RESPONSE, build::<EcmResponse> as Builder),
];

/// `error_status` value reported for a decoding error.
pub fn error_status(err: Option<&TlvError>) -> u16 {
    match err {
        None | Some(TlvError::InvalidMessage { .. }) | Some(TlvError::InternalError(_)) => {
            errors::INV_MESSAGE
        }
        Some(TlvError::UnsupportedVersion(_)) => errors::INV_PROTO_VERSION,
        Some(TlvError::UnknownCommandTag(_)) => errors::INV_MESSAGE_TYPE,
        Some(TlvError::UnknownParameterTag { .. }) => errors::INV_PARAM_TYPE,
        Some(TlvError::InvalidParameterLength { .. }) => errors::INV_PARAM_LENGTH,
        Some(TlvError::InvalidParameterCount { .. }) | Some(TlvError::MissingParameter(_)) => {
            errors::MISSING_PARAM
        }
    }
}

/// ECMG <=> SCS message handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct EcmgScs;

impl ProtocolHandler for EcmgScs {
    fn protocol(&self) -> &Protocol {
        protocol()
    }

    fn factory(&self, fact: &MessageFactory) -> Result<MessagePtr, TlvError> {
        let tag = fact.command_tag();
        let builder = BUILDERS
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, b)| *b)
            .ok_or_else(|| {
                TlvError::InternalError(format!("{PROTOCOL_NAME} message 0x{tag:04X} unimplemented"))
            })?;
        builder(fact)
    }

    fn build_error_response(&self, fact: &MessageFactory) -> MessagePtr {
        Box::new(ChannelError {
            channel_id: fact.get_u16(tags::ECM_CHANNEL_ID).unwrap_or(0),
            error_status: vec![error_status(fact.error())],
            error_information: vec![fact.error_information()],
            ..Default::default()
        })
    }
}
