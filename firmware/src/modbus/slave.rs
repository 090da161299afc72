//! Holding register slave: function codes 0x03, 0x06 and 0x10.
//!
//! Requests are decoded and replies encoded with `modbus-core`; the register
//! table is only touched through [`RegisterTable`].

use modbus_core::rtu::server::{decode_request, encode_response};
use modbus_core::rtu::{Header, ResponseAdu};
use modbus_core::{
    Data, Exception as PduException, ExceptionResponse, FunctionCode, Request, Response,
    ResponsePdu,
};
use simulator_core::registers::{RegisterError, RegisterTable};

use super::{BROADCAST_ADDRESS, Frame, MAX_ADU_SIZE, MIN_ADU_SIZE, crc_matches};

pub const READ_HOLDING_REGISTERS: u8 = 0x03;
pub const WRITE_SINGLE_REGISTER: u8 = 0x06;
pub const WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Largest quantity a single read may request.
pub const MAX_READ_QUANTITY: usize = 125;
/// Largest quantity a single multi-write may carry.
pub const MAX_WRITE_QUANTITY: usize = 123;

/// Exception codes returned in place of a normal reply.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Exception {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
}

impl Exception {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Exception::IllegalFunction => 0x01,
            Exception::IllegalDataAddress => 0x02,
            Exception::IllegalDataValue => 0x03,
            Exception::ServerDeviceFailure => 0x04,
        }
    }

    const fn to_pdu(self) -> PduException {
        match self {
            Exception::IllegalFunction => PduException::IllegalFunction,
            Exception::IllegalDataAddress => PduException::IllegalDataAddress,
            Exception::IllegalDataValue => PduException::IllegalDataValue,
            Exception::ServerDeviceFailure => PduException::ServerDeviceFailure,
        }
    }

    /// Exception for a frame whose PDU could not be decoded.
    const fn malformed(function: u8) -> Self {
        match function {
            READ_HOLDING_REGISTERS | WRITE_SINGLE_REGISTER | WRITE_MULTIPLE_REGISTERS => {
                Exception::IllegalDataValue
            }
            _ => Exception::IllegalFunction,
        }
    }
}

impl From<RegisterError> for Exception {
    fn from(error: RegisterError) -> Self {
        match error {
            RegisterError::Unmapped(_) => Exception::IllegalDataAddress,
            RegisterError::BankFull => Exception::ServerDeviceFailure,
        }
    }
}

/// Why a frame was dropped without a reply.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IgnoreReason {
    TooShort,
    BadCrc,
    /// Addressed to another slave.
    OtherSlave(u8),
    /// Reads make no sense without a reply.
    BroadcastRead,
}

/// Outcome of one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Disposition {
    /// Normal or exception reply to send back.
    Reply(Frame),
    /// Broadcast write, applied when valid; never answered.
    Broadcast(Option<Exception>),
    Ignored(IgnoreReason),
}

impl Disposition {
    /// Bytes to put on the wire, if any.
    pub fn into_reply(self) -> Frame {
        match self {
            Disposition::Reply(frame) => frame,
            Disposition::Broadcast(_) | Disposition::Ignored(_) => Frame::new(),
        }
    }
}

/// RTU slave answering for one unit address.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RtuSlave {
    slave_id: u8,
}

impl RtuSlave {
    pub const fn new(slave_id: u8) -> Self {
        Self { slave_id }
    }

    pub const fn slave_id(&self) -> u8 {
        self.slave_id
    }

    /// Validates one received frame and executes it against `table`.
    pub fn handle<T: RegisterTable>(&self, request: &[u8], table: &mut T) -> Disposition {
        if request.len() < MIN_ADU_SIZE {
            return Disposition::Ignored(IgnoreReason::TooShort);
        }
        if !crc_matches(request) {
            return Disposition::Ignored(IgnoreReason::BadCrc);
        }

        let address = request[0];
        let broadcast = address == BROADCAST_ADDRESS;
        if !broadcast && address != self.slave_id {
            return Disposition::Ignored(IgnoreReason::OtherSlave(address));
        }

        let function = request[1];
        let result = match decode_request(request) {
            Ok(Some(adu)) => match adu.pdu.0 {
                Request::ReadHoldingRegisters(..) if broadcast => {
                    return Disposition::Ignored(IgnoreReason::BroadcastRead);
                }
                Request::ReadHoldingRegisters(start, quantity) => {
                    read_holding(address, start, quantity, table)
                }
                Request::WriteSingleRegister(register, value) => {
                    write_single(address, register, value, table)
                }
                Request::WriteMultipleRegisters(start, data) => {
                    write_multiple(address, start, &data, table)
                }
                _ => Err(Exception::IllegalFunction),
            },
            // A CRC-clean frame that still does not decode has a bad length.
            Ok(None) | Err(_) => Err(Exception::malformed(function)),
        };

        if broadcast {
            return Disposition::Broadcast(result.err());
        }

        Disposition::Reply(match result {
            Ok(frame) => frame,
            Err(exception) => exception_reply(address, function, exception),
        })
    }
}

fn read_holding<T: RegisterTable>(
    address: u8,
    start: u16,
    quantity: u16,
    table: &T,
) -> Result<Frame, Exception> {
    let count = usize::from(quantity);
    if count == 0 || count > MAX_READ_QUANTITY {
        return Err(Exception::IllegalDataValue);
    }

    let mut words = [0u16; MAX_READ_QUANTITY];
    table.read_block(start, &mut words[..count])?;

    let mut bytes = [0u8; 2 * MAX_READ_QUANTITY];
    let data = Data::from_words(&words[..count], &mut bytes)
        .map_err(|_| Exception::ServerDeviceFailure)?;
    encode(address, Ok(Response::ReadHoldingRegisters(data)))
}

fn write_single<T: RegisterTable>(
    address: u8,
    register: u16,
    value: u16,
    table: &mut T,
) -> Result<Frame, Exception> {
    table.write(register, value)?;
    encode(address, Ok(Response::WriteSingleRegister(register, value)))
}

fn write_multiple<T: RegisterTable>(
    address: u8,
    start: u16,
    data: &Data<'_>,
    table: &mut T,
) -> Result<Frame, Exception> {
    let count = data.len();
    if count == 0 || count > MAX_WRITE_QUANTITY {
        return Err(Exception::IllegalDataValue);
    }

    let mut words = [0u16; MAX_WRITE_QUANTITY];
    for (index, word) in words[..count].iter_mut().enumerate() {
        *word = data.get(index).ok_or(Exception::IllegalDataValue)?;
    }
    table.write_block(start, &words[..count])?;

    let quantity = u16::try_from(count).map_err(|_| Exception::IllegalDataValue)?;
    encode(address, Ok(Response::WriteMultipleRegisters(start, quantity)))
}

fn exception_reply(address: u8, function: u8, exception: Exception) -> Frame {
    let response = ExceptionResponse {
        function: FunctionCode::new(function),
        exception: exception.to_pdu(),
    };
    // Nothing goes on the wire if even the exception cannot be encoded.
    encode(address, Err(response)).unwrap_or_default()
}

fn encode(
    address: u8,
    pdu: Result<Response<'_>, ExceptionResponse>,
) -> Result<Frame, Exception> {
    let adu = ResponseAdu {
        hdr: Header { slave: address },
        pdu: ResponsePdu(pdu),
    };
    let mut buffer = [0u8; MAX_ADU_SIZE];
    let len = encode_response(adu, &mut buffer).map_err(|_| Exception::ServerDeviceFailure)?;

    let mut frame = Frame::new();
    frame
        .extend_from_slice(&buffer[..len])
        .map_err(|_| Exception::ServerDeviceFailure)?;
    Ok(frame)
}
