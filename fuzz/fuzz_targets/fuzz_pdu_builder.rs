#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use voltage_modbus_ascii::{PduBuilder, MAX_PDU_SIZE};

#[derive(Debug, Arbitrary)]
enum Request {
    Read { fc: u8, address: u16, quantity: u16 },
    WriteCoils { address: u16, values: Vec<bool> },
    WriteRegisters { address: u16, values: Vec<u16> },
    ReadWrite { read_address: u16, read_quantity: u16, write_address: u16, values: Vec<u16> },
    Diagnostic { sub_function: u16, data: Vec<u8> },
    Encapsulated { mei_type: u8, data: Vec<u8> },
}

fuzz_target!(|request: Request| {
    let result = match request {
        Request::Read { fc, address, quantity } => {
            PduBuilder::build_read_request(fc, address, quantity)
        }
        Request::WriteCoils { address, values } => {
            PduBuilder::build_write_multiple_coils(address, &values)
        }
        Request::WriteRegisters { address, values } => {
            PduBuilder::build_write_multiple_registers(address, &values)
        }
        Request::ReadWrite { read_address, read_quantity, write_address, values } => {
            PduBuilder::build_read_write_multiple_registers(
                read_address,
                read_quantity,
                write_address,
                &values,
            )
        }
        Request::Diagnostic { sub_function, data } => {
            PduBuilder::build_diagnostic(sub_function, &data)
        }
        Request::Encapsulated { mei_type, data } => {
            PduBuilder::build_encapsulated_interface_transport(mei_type, &data)
        }
    };

    // Builders either reject the input or produce a bounded PDU
    if let Ok(pdu) = result {
        assert!(!pdu.is_empty());
        assert!(pdu.len() <= MAX_PDU_SIZE);
    }
});
