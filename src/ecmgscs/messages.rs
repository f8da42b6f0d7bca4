//! Typed ECMG <=> SCS messages.

use std::any::Any;

use bytes::Bytes;

use super::tags::{self, command_name};
use super::{CURRENT_VERSION, PROTOCOL_NAME};
use crate::tlv::{
    FromFactory, Message, MessageFactory, Serializer, Tag, TlvError, Version, dump_bytes,
    dump_decimal, dump_header, dump_hexa, dump_optional_bytes, dump_optional_decimal, dump_vector,
};

/// Common `Message` plumbing. Each type provides `put_parameters` and `dump_fields`.
macro_rules! impl_message {
    ($ty:ident, $tag:expr) => {
        impl Message for $ty {
            fn protocol_version(&self) -> Version {
                self.version
            }

            fn command_tag(&self) -> Tag {
                $tag
            }

            fn serialize_parameters(&self, ser: &mut Serializer) {
                self.put_parameters(ser);
            }

            fn dump(&self, indent: usize) -> String {
                dump_header(indent, command_name($tag), PROTOCOL_NAME, self.version, $tag)
                    + &self.dump_fields(indent)
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

/// Messages made of a channel id only.
macro_rules! channel_message {
    ($(#[$doc:meta])* $ty:ident, $tag:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $ty {
            pub version: Version,
            pub channel_id: u16,
        }

        impl Default for $ty {
            fn default() -> Self {
                Self { version: CURRENT_VERSION, channel_id: 0 }
            }
        }

        impl FromFactory for $ty {
            fn from_factory(fact: &MessageFactory) -> Result<Self, TlvError> {
                Ok(Self {
                    version: fact.protocol_version(),
                    channel_id: fact.get_u16(tags::ECM_CHANNEL_ID)?,
                })
            }
        }

        impl $ty {
            fn put_parameters(&self, ser: &mut Serializer) {
                ser.put_u16(tags::ECM_CHANNEL_ID, self.channel_id);
            }

            fn dump_fields(&self, indent: usize) -> String {
                dump_hexa(indent, "ECM_channel_id", self.channel_id)
            }
        }

        impl_message!($ty, $tag);
    };
}

/// Messages made of a channel id and a stream id only.
macro_rules! stream_message {
    ($(#[$doc:meta])* $ty:ident, $tag:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $ty {
            pub version: Version,
            pub channel_id: u16,
            pub stream_id: u16,
        }

        impl Default for $ty {
            fn default() -> Self {
                Self { version: CURRENT_VERSION, channel_id: 0, stream_id: 0 }
            }
        }

        impl FromFactory for $ty {
            fn from_factory(fact: &MessageFactory) -> Result<Self, TlvError> {
                Ok(Self {
                    version: fact.protocol_version(),
                    channel_id: fact.get_u16(tags::ECM_CHANNEL_ID)?,
                    stream_id: fact.get_u16(tags::ECM_STREAM_ID)?,
                })
            }
        }

        impl $ty {
            fn put_parameters(&self, ser: &mut Serializer) {
                ser.put_u16(tags::ECM_CHANNEL_ID, self.channel_id);
                ser.put_u16(tags::ECM_STREAM_ID, self.stream_id);
            }

            fn dump_fields(&self, indent: usize) -> String {
                dump_hexa(indent, "ECM_channel_id", self.channel_id)
                    + &dump_hexa(indent, "ECM_stream_id", self.stream_id)
            }
        }

        impl_message!($ty, $tag);
    };
}

channel_message!(
    /// channel_test: SCS or ECMG checks that the channel is alive.
    ChannelTest,
    tags::CHANNEL_TEST
);
channel_message!(
    /// channel_close
    ChannelClose,
    tags::CHANNEL_CLOSE
);
stream_message!(
    /// stream_test
    StreamTest,
    tags::STREAM_TEST
);
stream_message!(
    /// stream_close_request: SCS asks the ECMG to close a stream.
    StreamCloseRequest,
    tags::STREAM_CLOSE_REQUEST
);
stream_message!(
    /// stream_close_response
    StreamCloseResponse,
    tags::STREAM_CLOSE_RESPONSE
);

//
// channel_setup
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSetup {
    pub version: Version,
    pub channel_id: u16,
    pub super_cas_id: u32,
}

impl Default for ChannelSetup {
    fn default() -> Self {
        Self { version: CURRENT_VERSION, channel_id: 0, super_cas_id: 0 }
    }
}

impl FromFactory for ChannelSetup {
    fn from_factory(fact: &MessageFactory) -> Result<Self, TlvError> {
        Ok(Self {
            version: fact.protocol_version(),
            channel_id: fact.get_u16(tags::ECM_CHANNEL_ID)?,
            super_cas_id: fact.get_u32(tags::SUPER_CAS_ID)?,
        })
    }
}

impl ChannelSetup {
    fn put_parameters(&self, ser: &mut Serializer) {
        ser.put_u16(tags::ECM_CHANNEL_ID, self.channel_id);
        ser.put_u32(tags::SUPER_CAS_ID, self.super_cas_id);
    }

    fn dump_fields(&self, indent: usize) -> String {
        dump_hexa(indent, "ECM_channel_id", self.channel_id)
            + &dump_hexa(indent, "Super_CAS_id", self.super_cas_id)
    }
}

impl_message!(ChannelSetup, tags::CHANNEL_SETUP);

//
// channel_status
//

/// ECMG capabilities and timing for one channel. Delays are signed milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub version: Version,
    pub channel_id: u16,
    pub section_tspkt_flag: bool,
    pub ac_delay_start: Option<i16>,
    pub ac_delay_stop: Option<i16>,
    pub delay_start: i16,
    pub delay_stop: i16,
    pub transition_delay_start: Option<i16>,
    pub transition_delay_stop: Option<i16>,
    pub ecm_rep_period: u16,
    pub max_streams: u16,
    pub min_cp_duration: u16,
    pub lead_cw: u8,
    pub cw_per_msg: u8,
    pub max_comp_time: u16,
}

impl Default for ChannelStatus {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            channel_id: 0,
            section_tspkt_flag: false,
            ac_delay_start: None,
            ac_delay_stop: None,
            delay_start: 0,
            delay_stop: 0,
            transition_delay_start: None,
            transition_delay_stop: None,
            ecm_rep_period: 0,
            max_streams: 0,
            min_cp_duration: 0,
            lead_cw: 0,
            cw_per_msg: 0,
            max_comp_time: 0,
        }
    }
}

impl FromFactory for ChannelStatus {
    fn from_factory(fact: &MessageFactory) -> Result<Self, TlvError> {
        Ok(Self {
            version: fact.protocol_version(),
            channel_id: fact.get_u16(tags::ECM_CHANNEL_ID)?,
            section_tspkt_flag: fact.get_bool(tags::SECTION_TSPKT_FLAG)?,
            ac_delay_start: fact.get_opt_i16(tags::AC_DELAY_START)?,
            ac_delay_stop: fact.get_opt_i16(tags::AC_DELAY_STOP)?,
            delay_start: fact.get_i16(tags::DELAY_START)?,
            delay_stop: fact.get_i16(tags::DELAY_STOP)?,
            transition_delay_start: fact.get_opt_i16(tags::TRANSITION_DELAY_START)?,
            transition_delay_stop: fact.get_opt_i16(tags::TRANSITION_DELAY_STOP)?,
            ecm_rep_period: fact.get_u16(tags::ECM_REP_PERIOD)?,
            max_streams: fact.get_u16(tags::MAX_STREAMS)?,
            min_cp_duration: fact.get_u16(tags::MIN_CP_DURATION)?,
            lead_cw: fact.get_u8(tags::LEAD_CW)?,
            cw_per_msg: fact.get_u8(tags::CW_PER_MSG)?,
            max_comp_time: fact.get_u16(tags::MAX_COMP_TIME)?,
        })
    }
}

impl ChannelStatus {
    fn put_parameters(&self, ser: &mut Serializer) {
        ser.put_u16(tags::ECM_CHANNEL_ID, self.channel_id);
        ser.put_bool(tags::SECTION_TSPKT_FLAG, self.section_tspkt_flag);
        ser.put_opt_i16(tags::AC_DELAY_START, self.ac_delay_start);
        ser.put_opt_i16(tags::AC_DELAY_STOP, self.ac_delay_stop);
        ser.put_i16(tags::DELAY_START, self.delay_start);
        ser.put_i16(tags::DELAY_STOP, self.delay_stop);
        ser.put_opt_i16(tags::TRANSITION_DELAY_START, self.transition_delay_start);
        ser.put_opt_i16(tags::TRANSITION_DELAY_STOP, self.transition_delay_stop);
        ser.put_u16(tags::ECM_REP_PERIOD, self.ecm_rep_period);
        ser.put_u16(tags::MAX_STREAMS, self.max_streams);
        ser.put_u16(tags::MIN_CP_DURATION, self.min_cp_duration);
        ser.put_u8(tags::LEAD_CW, self.lead_cw);
        ser.put_u8(tags::CW_PER_MSG, self.cw_per_msg);
        ser.put_u16(tags::MAX_COMP_TIME, self.max_comp_time);
    }

    fn dump_fields(&self, indent: usize) -> String {
        [
            dump_hexa(indent, "ECM_channel_id", self.channel_id),
            dump_decimal(indent, "section_TSpkt_flag", u8::from(self.section_tspkt_flag)),
            dump_optional_decimal(indent, "AC_delay_start", &self.ac_delay_start),
            dump_optional_decimal(indent, "AC_delay_stop", &self.ac_delay_stop),
            dump_decimal(indent, "delay_start", self.delay_start),
            dump_decimal(indent, "delay_stop", self.delay_stop),
            dump_optional_decimal(indent, "transition_delay_start", &self.transition_delay_start),
            dump_optional_decimal(indent, "transition_delay_stop", &self.transition_delay_stop),
            dump_decimal(indent, "ECM_rep_period", self.ecm_rep_period),
            dump_decimal(indent, "max_streams", self.max_streams),
            dump_decimal(indent, "min_CP_duration", self.min_cp_duration),
            dump_decimal(indent, "lead_CW", self.lead_cw),
            dump_decimal(indent, "CW_per_msg", self.cw_per_msg),
            dump_decimal(indent, "max_comp_time", self.max_comp_time),
        ]
        .concat()
    }
}

impl_message!(ChannelStatus, tags::CHANNEL_STATUS);

//
// channel_error / stream_error
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelError {
    pub version: Version,
    pub channel_id: u16,
    pub error_status: Vec<u16>,
    pub error_information: Vec<u16>,
}

impl Default for ChannelError {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            channel_id: 0,
            error_status: Vec::new(),
            error_information: Vec::new(),
        }
    }
}

impl FromFactory for ChannelError {
    fn from_factory(fact: &MessageFactory) -> Result<Self, TlvError> {
        Ok(Self {
            version: fact.protocol_version(),
            channel_id: fact.get_u16(tags::ECM_CHANNEL_ID)?,
            error_status: fact.get_u16_all(tags::ERROR_STATUS)?,
            error_information: fact.get_u16_all(tags::ERROR_INFORMATION)?,
        })
    }
}

impl ChannelError {
    fn put_parameters(&self, ser: &mut Serializer) {
        ser.put_u16(tags::ECM_CHANNEL_ID, self.channel_id);
        ser.put_u16_vec(tags::ERROR_STATUS, &self.error_status);
        ser.put_u16_vec(tags::ERROR_INFORMATION, &self.error_information);
    }

    fn dump_fields(&self, indent: usize) -> String {
        dump_hexa(indent, "ECM_channel_id", self.channel_id)
            + &dump_vector(indent, "error_status", &self.error_status)
            + &dump_vector(indent, "error_information", &self.error_information)
    }
}

impl_message!(ChannelError, tags::CHANNEL_ERROR);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    pub version: Version,
    pub channel_id: u16,
    pub stream_id: u16,
    pub error_status: Vec<u16>,
    pub error_information: Vec<u16>,
}

impl Default for StreamError {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            channel_id: 0,
            stream_id: 0,
            error_status: Vec::new(),
            error_information: Vec::new(),
        }
    }
}

impl FromFactory for StreamError {
    fn from_factory(fact: &MessageFactory) -> Result<Self, TlvError> {
        Ok(Self {
            version: fact.protocol_version(),
            channel_id: fact.get_u16(tags::ECM_CHANNEL_ID)?,
            stream_id: fact.get_u16(tags::ECM_STREAM_ID)?,
            error_status: fact.get_u16_all(tags::ERROR_STATUS)?,
            error_information: fact.get_u16_all(tags::ERROR_INFORMATION)?,
        })
    }
}

impl StreamError {
    fn put_parameters(&self, ser: &mut Serializer) {
        ser.put_u16(tags::ECM_CHANNEL_ID, self.channel_id);
        ser.put_u16(tags::ECM_STREAM_ID, self.stream_id);
        ser.put_u16_vec(tags::ERROR_STATUS, &self.error_status);
        ser.put_u16_vec(tags::ERROR_INFORMATION, &self.error_information);
    }

    fn dump_fields(&self, indent: usize) -> String {
        dump_hexa(indent, "ECM_channel_id", self.channel_id)
            + &dump_hexa(indent, "ECM_stream_id", self.stream_id)
            + &dump_vector(indent, "error_status", &self.error_status)
            + &dump_vector(indent, "error_information", &self.error_information)
    }
}

impl_message!(StreamError, tags::STREAM_ERROR);

//
// stream_setup / stream_status
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSetup {
    pub version: Version,
    pub channel_id: u16,
    pub stream_id: u16,
    pub ecm_id: u16,
    pub nominal_cp_duration: u16,
}

impl Default for StreamSetup {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            channel_id: 0,
            stream_id: 0,
            ecm_id: 0,
            nominal_cp_duration: 0,
        }
    }
}

impl FromFactory for StreamSetup {
    fn from_factory(fact: &MessageFactory) -> Result<Self, TlvError> {
        Ok(Self {
            version: fact.protocol_version(),
            channel_id: fact.get_u16(tags::ECM_CHANNEL_ID)?,
            stream_id: fact.get_u16(tags::ECM_STREAM_ID)?,
            ecm_id: fact.get_u16(tags::ECM_ID)?,
            nominal_cp_duration: fact.get_u16(tags::NOMINAL_CP_DURATION)?,
        })
    }
}

impl StreamSetup {
    fn put_parameters(&self, ser: &mut Serializer) {
        ser.put_u16(tags::ECM_CHANNEL_ID, self.channel_id);
        ser.put_u16(tags::ECM_STREAM_ID, self.stream_id);
        ser.put_u16(tags::ECM_ID, self.ecm_id);
        ser.put_u16(tags::NOMINAL_CP_DURATION, self.nominal_cp_duration);
    }

    fn dump_fields(&self, indent: usize) -> String {
        dump_hexa(indent, "ECM_channel_id", self.channel_id)
            + &dump_hexa(indent, "ECM_stream_id", self.stream_id)
            + &dump_hexa(indent, "ECM_id", self.ecm_id)
            + &dump_decimal(indent, "nominal_CP_duration", self.nominal_cp_duration)
    }
}

impl_message!(StreamSetup, tags::STREAM_SETUP);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStatus {
    pub version: Version,
    pub channel_id: u16,
    pub stream_id: u16,
    pub ecm_id: u16,
    pub access_criteria_transfer_mode: bool,
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            channel_id: 0,
            stream_id: 0,
            ecm_id: 0,
            access_criteria_transfer_mode: false,
        }
    }
}

impl FromFactory for StreamStatus {
    fn from_factory(fact: &MessageFactory) -> Result<Self, TlvError> {
        Ok(Self {
            version: fact.protocol_version(),
            channel_id: fact.get_u16(tags::ECM_CHANNEL_ID)?,
            stream_id: fact.get_u16(tags::ECM_STREAM_ID)?,
            ecm_id: fact.get_u16(tags::ECM_ID)?,
            access_criteria_transfer_mode: fact.get_bool(tags::ACCESS_CRITERIA_TRANSFER_MODE)?,
        })
    }
}

impl StreamStatus {
    fn put_parameters(&self, ser: &mut Serializer) {
        ser.put_u16(tags::ECM_CHANNEL_ID, self.channel_id);
        ser.put_u16(tags::ECM_STREAM_ID, self.stream_id);
        ser.put_u16(tags::ECM_ID, self.ecm_id);
        ser.put_bool(tags::ACCESS_CRITERIA_TRANSFER_MODE, self.access_criteria_transfer_mode);
    }

    fn dump_fields(&self, indent: usize) -> String {
        dump_hexa(indent, "ECM_channel_id", self.channel_id)
            + &dump_hexa(indent, "ECM_stream_id", self.stream_id)
            + &dump_hexa(indent, "ECM_id", self.ecm_id)
            + &dump_decimal(
                indent,
                "access_criteria_transfer_mode",
                u8::from(self.access_criteria_transfer_mode),
            )
    }
}

impl_message!(StreamStatus, tags::STREAM_STATUS);

//
// CW_provision
//

/// One crypto period number and its control word.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpCwCombination {
    pub cp: u16,
    pub cw: Bytes,
}

/// Control words sent by the SCS for ECM generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CwProvision {
    pub version: Version,
    pub channel_id: u16,
    pub stream_id: u16,
    pub cp_number: u16,
    pub cw_encryption: Option<Bytes>,
    pub cp_cw_combination: Vec<CpCwCombination>,
    pub cp_duration: Option<u16>,
    pub access_criteria: Option<Bytes>,
}

impl Default for CwProvision {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            channel_id: 0,
            stream_id: 0,
            cp_number: 0,
            cw_encryption: None,
            cp_cw_combination: Vec::new(),
            cp_duration: None,
            access_criteria: None,
        }
    }
}

impl FromFactory for CwProvision {
    fn from_factory(fact: &MessageFactory) -> Result<Self, TlvError> {
        let cp_cw_combination = fact
            .get_bytes_all(tags::CP_CW_COMBINATION)
            .into_iter()
            .map(|value| {
                if value.len() < 2 {
                    return Err(TlvError::InternalError(format!(
                        "CP_CW_combination of {} bytes",
                        value.len()
                    )));
                }
                Ok(CpCwCombination {
                    cp: u16::from_be_bytes([value[0], value[1]]),
                    cw: value.slice(2..),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version: fact.protocol_version(),
            channel_id: fact.get_u16(tags::ECM_CHANNEL_ID)?,
            stream_id: fact.get_u16(tags::ECM_STREAM_ID)?,
            cp_number: fact.get_u16(tags::CP_NUMBER)?,
            cw_encryption: fact.get_opt_bytes(tags::CW_ENCRYPTION)?,
            cp_cw_combination,
            cp_duration: fact.get_opt_u16(tags::CP_DURATION)?,
            access_criteria: fact.get_opt_bytes(tags::ACCESS_CRITERIA)?,
        })
    }
}

impl CwProvision {
    fn put_parameters(&self, ser: &mut Serializer) {
        ser.put_u16(tags::ECM_CHANNEL_ID, self.channel_id);
        ser.put_u16(tags::ECM_STREAM_ID, self.stream_id);
        ser.put_u16(tags::CP_NUMBER, self.cp_number);
        ser.put_opt_bytes(tags::CW_ENCRYPTION, self.cw_encryption.as_ref());
        ser.put_opt_u16(tags::CP_DURATION, self.cp_duration);
        ser.put_opt_bytes(tags::ACCESS_CRITERIA, self.access_criteria.as_ref());
        for comb in &self.cp_cw_combination {
            ser.open_tlv(tags::CP_CW_COMBINATION);
            ser.put_raw_u16(comb.cp);
            ser.put_raw_bytes(&comb.cw);
            ser.close_tlv();
        }
    }

    fn dump_fields(&self, indent: usize) -> String {
        let mut s = dump_hexa(indent, "ECM_channel_id", self.channel_id)
            + &dump_hexa(indent, "ECM_stream_id", self.stream_id)
            + &dump_decimal(indent, "CP_number", self.cp_number)
            + &dump_optional_bytes(indent, "CW_encryption", self.cw_encryption.as_ref())
            + &dump_optional_decimal(indent, "CP_duration", &self.cp_duration)
            + &dump_optional_bytes(indent, "access_criteria", self.access_criteria.as_ref());
        for comb in &self.cp_cw_combination {
            s += &dump_decimal(indent, "CP", comb.cp);
            s += &dump_bytes(indent, "CW", &comb.cw);
        }
        s
    }
}

impl_message!(CwProvision, tags::CW_PROVISION);

//
// ECM_response
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcmResponse {
    pub version: Version,
    pub channel_id: u16,
    pub stream_id: u16,
    pub cp_number: u16,
    pub ecm_datagram: Bytes,
}

impl Default for EcmResponse {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            channel_id: 0,
            stream_id: 0,
            cp_number: 0,
            ecm_datagram: Bytes::new(),
        }
    }
}

impl FromFactory for EcmResponse {
    fn from_factory(fact: &MessageFactory) -> Result<Self, TlvError> {
        Ok(Self {
            version: fact.protocol_version(),
            channel_id: fact.get_u16(tags::ECM_CHANNEL_ID)?,
            stream_id: fact.get_u16(tags::ECM_STREAM_ID)?,
            cp_number: fact.get_u16(tags::CP_NUMBER)?,
            ecm_datagram: fact.get_bytes(tags::ECM_DATAGRAM)?,
        })
    }
}

impl EcmResponse {
    fn put_parameters(&self, ser: &mut Serializer) {
        ser.put_u16(tags::ECM_CHANNEL_ID, self.channel_id);
        ser.put_u16(tags::ECM_STREAM_ID, self.stream_id);
        ser.put_u16(tags::CP_NUMBER, self.cp_number);
        ser.put_bytes(tags::ECM_DATAGRAM, &self.ecm_datagram);
    }

    fn dump_fields(&self, indent: usize) -> String {
        dump_hexa(indent, "ECM_channel_id", self.channel_id)
            + &dump_hexa(indent, "ECM_stream_id", self.stream_id)
            + &dump_decimal(indent, "CP_number", self.cp_number)
            + &dump_bytes(indent, "ECM_datagram", &self.ecm_datagram)
    }
}

impl_message!(EcmResponse, tags::ECM_RESPONSE);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecmgscs::{EcmgScs, protocol};
    use crate::tlv::ProtocolHandler;

    /// Encode, check the bytes against the schema, decode, compare.
    fn round_trip<M: Message + PartialEq + Clone>(msg: &M) -> Bytes {
        let handler = EcmgScs;
        let bytes = handler.encode(msg).unwrap();
        assert_eq!(protocol().validate(&bytes), Ok(()), "{}", msg.dump(0));
        let decoded = handler.decode(&bytes).unwrap();
        assert_eq!(decoded.command_tag(), msg.command_tag());
        assert_eq!(decoded.as_any().downcast_ref::<M>(), Some(msg));
        bytes
    }

    fn cw(fill: u8) -> Bytes {
        Bytes::from(vec![fill; crate::ecmgscs::CW_BYTES])
    }

    #[test]
    fn test_channel_setup_bytes() {
        let msg = ChannelSetup { channel_id: 1, super_cas_id: 0x4ADC_0001, ..Default::default() };
        let bytes = round_trip(&msg);
        assert_eq!(hex::encode(&bytes), "020001000e000e00020001000100044adc0001");
    }

    #[test]
    fn test_simple_messages() {
        round_trip(&ChannelTest { channel_id: 3, ..Default::default() });
        round_trip(&ChannelClose { channel_id: 0xFFFF, ..Default::default() });
        round_trip(&StreamTest { channel_id: 1, stream_id: 2, ..Default::default() });
        round_trip(&StreamCloseRequest { channel_id: 1, stream_id: 9, ..Default::default() });
        round_trip(&StreamCloseResponse { channel_id: 1, stream_id: 9, ..Default::default() });
        round_trip(&StreamSetup {
            channel_id: 1,
            stream_id: 2,
            ecm_id: 0x0102,
            nominal_cp_duration: 100,
            ..Default::default()
        });
        round_trip(&StreamStatus {
            channel_id: 1,
            stream_id: 2,
            ecm_id: 0x0102,
            access_criteria_transfer_mode: true,
            ..Default::default()
        });
        round_trip(&EcmResponse {
            channel_id: 1,
            stream_id: 2,
            cp_number: 7,
            ecm_datagram: Bytes::from_static(&[0x80, 0x70, 0x03, 1, 2, 3]),
            ..Default::default()
        });
        round_trip(&EcmResponse::default());
    }

    #[test]
    fn test_channel_status_optionals() {
        let all = ChannelStatus {
            channel_id: 4,
            section_tspkt_flag: true,
            ac_delay_start: Some(-200),
            ac_delay_stop: Some(100),
            delay_start: -500,
            delay_stop: 300,
            transition_delay_start: Some(-50),
            transition_delay_stop: Some(0),
            ecm_rep_period: 100,
            max_streams: 8,
            min_cp_duration: 50,
            lead_cw: 1,
            cw_per_msg: 2,
            max_comp_time: 200,
            ..Default::default()
        };
        let full = round_trip(&all);

        let none = ChannelStatus {
            ac_delay_start: None,
            ac_delay_stop: None,
            transition_delay_start: None,
            transition_delay_stop: None,
            ..all.clone()
        };
        let short = round_trip(&none);
        // four 2-byte optional parameters, 6 bytes each on the wire
        assert_eq!(full.len() - short.len(), 24);
    }

    #[test]
    fn test_errors_round_trip() {
        round_trip(&ChannelError {
            channel_id: 2,
            error_status: vec![0x0006, 0x7000],
            error_information: vec![0x000E],
            ..Default::default()
        });
        round_trip(&StreamError {
            channel_id: 2,
            stream_id: 3,
            error_status: vec![0x0007],
            error_information: vec![],
            ..Default::default()
        });
    }

    #[test]
    fn test_cw_provision() {
        let all = CwProvision {
            channel_id: 1,
            stream_id: 2,
            cp_number: 10,
            cw_encryption: Some(Bytes::from_static(b"\x01\x02")),
            cp_cw_combination: vec![
                CpCwCombination { cp: 10, cw: cw(0xAA) },
                CpCwCombination { cp: 11, cw: cw(0xBB) },
            ],
            cp_duration: Some(100),
            access_criteria: Some(Bytes::new()),
            ..Default::default()
        };
        round_trip(&all);

        let minimal = CwProvision {
            cw_encryption: None,
            cp_duration: None,
            access_criteria: None,
            cp_cw_combination: vec![CpCwCombination { cp: 10, cw: cw(0x11) }],
            ..all
        };
        let bytes = round_trip(&minimal);
        // header 5 + 3 * 6 + CP_CW_combination (4 + 2 + 8)
        assert_eq!(bytes.len(), 5 + 18 + 14);
    }

    #[test]
    fn test_cw_provision_requires_combination() {
        let msg = CwProvision { channel_id: 1, stream_id: 2, ..Default::default() };
        let bytes = EcmgScs.encode(&msg).unwrap();
        assert_eq!(
            protocol().validate(&bytes),
            Err(TlvError::MissingParameter(tags::CP_CW_COMBINATION))
        );
    }

    #[test]
    fn test_oversized_ecm_datagram() {
        // largest datagram the parameter allows, but the message body overflows
        let msg = EcmResponse { ecm_datagram: Bytes::from(vec![0; 0xFFFF]), ..Default::default() };
        assert!(EcmgScs.encode(&msg).is_err());

        let msg = EcmResponse { ecm_datagram: Bytes::from(vec![0; 70000]), ..Default::default() };
        assert!(EcmgScs.encode(&msg).is_err());

        // 65535 - 3 * 6 - 4 bytes still fit
        let msg = EcmResponse { ecm_datagram: Bytes::from(vec![0; 0xFFFF - 22]), ..Default::default() };
        let bytes = round_trip(&msg);
        assert_eq!(bytes.len(), 5 + 0xFFFF);
    }

    #[test]
    fn test_dump() {
        let msg = ChannelTest { channel_id: 0x12, ..Default::default() };
        assert_eq!(
            msg.dump(2),
            "  channel_test (ECMG<=>SCS)\n  protocol_version = 0x02\n  message_type = 0x0002\n  ECM_channel_id = 0x0012\n"
        );

        let msg = ChannelStatus { ac_delay_start: Some(-5), ..Default::default() };
        let dump = msg.dump(0);
        assert!(dump.contains("AC_delay_start = -5\n"));
        assert!(!dump.contains("AC_delay_stop"));

        let msg = CwProvision {
            cp_cw_combination: vec![CpCwCombination { cp: 3, cw: cw(0) }],
            ..Default::default()
        };
        assert!(msg.dump(0).starts_with("CW_provision (ECMG<=>SCS)\n"));
        assert!(msg.dump(0).contains("CP = 3\nCW (8 bytes) =\n  00 00 00 00 00 00 00 00\n"));
    }
}
