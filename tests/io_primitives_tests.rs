//! Terminal I/O, terminal control and MPE requests from the host

mod common;

#[cfg(test)]
mod io_primitives_tests {
    use super::common::{io_response, open_connection, post_read, u16_at, Capture, HostRequest};
    use vt3kr::error::{ProtocolViolation, VtError};
    use vt3kr::vt::codes::*;
    use vt3kr::vt::connection::carriage_control_bytes;
    use vt3kr::vt::message::{
        AbortRequest, DriverControlRequest, FdcRequest, IoResponse, MpeControlRequest, SetBreakRequest,
        SimpleMessage, WriteRequest,
    };
    use vt3kr::vt::{ConnectionState, DriverMode, Event, VtConnection};

    fn write(conn: &mut VtConnection, io: &mut Capture, flags: u16, data: &[u8]) -> Vec<Event> {
        conn.receive(&WriteRequest { request_count: 3, flags, data }.encode(), io).unwrap()
    }

    fn driver(conn: &mut VtConnection, io: &mut Capture, req: DriverControlRequest) -> (u16, u16) {
        io.clear();
        conn.receive(&req.encode(), io).unwrap();
        let rec = &io.sent[0];
        assert_eq!(rec.len(), terminal_cntl::DRIVER_RESP_LEN);
        assert_eq!(rec[OFF_MESSAGE_TYPE], MSG_TERMINAL_CNTL_RESP);
        assert_eq!(rec[OFF_PRIMITIVE], PRIM_SET_DRIVER_INFO);
        (u16_at(rec, terminal_cntl::RESPONSE_CODE), u16_at(rec, terminal_cntl::STATUS_MASK))
    }

    #[test]
    fn test_abort_completes_read_then_acknowledges() {
        let (mut conn, mut io) = open_connection();
        post_read(&mut conn, &mut io, 2, 80, 0);
        let events = conn
            .receive(&AbortRequest { request_count: 9, read_request_count: 2 }.encode(), &mut io)
            .unwrap();
        assert_eq!(events, vec![Event::ReadAborted]);
        assert!(!conn.read_in_progress());
        assert_eq!(io.sent.len(), 2);

        let (rc, code, mask, count, data) = io_response(&io.sent[0]);
        assert_eq!(io.sent[0][OFF_PRIMITIVE], PRIM_READ);
        assert_eq!((rc, code, mask, count), (2, RESP_SUCCESSFUL, COMP_ABORTED, 0));
        assert!(data.is_empty());

        let ack = &io.sent[1];
        assert_eq!(ack.len(), terminal_io::ABORT_RESP_LEN);
        assert_eq!(ack[OFF_MESSAGE_TYPE], MSG_TERMINAL_IO_RESP);
        assert_eq!(ack[OFF_PRIMITIVE], PRIM_ABORT);
        assert_eq!(u16_at(ack, terminal_io::REQUEST_COUNT), 9);
        assert_eq!(u16_at(ack, terminal_io::RESPONSE_CODE), RESP_SUCCESSFUL);
    }

    #[test]
    fn test_write_with_prespace_cctl() {
        let (mut conn, mut io) = open_connection();
        let events = write(&mut conn, &mut io, WRITE_USE_CCTL | WRITE_PRESPACE, &[0x81, b'h', b'i']);
        assert!(events.is_empty());
        assert_eq!(io.shown, b"\r\nhi");
        assert_eq!(io.output, vec![b"hi".to_vec()]);
        assert!(io.sent.is_empty());
    }

    #[test]
    fn test_write_with_postspace_cctl() {
        let (mut conn, mut io) = open_connection();
        write(&mut conn, &mut io, WRITE_USE_CCTL, &[0x82, b'o', b'k']);
        assert_eq!(io.shown, b"ok\r\n\n");
    }

    #[test]
    fn test_write_without_cctl_shows_data_verbatim() {
        let (mut conn, mut io) = open_connection();
        write(&mut conn, &mut io, 0, &[0x81, b'x']);
        assert_eq!(io.shown, [0x81, b'x']);
    }

    #[test]
    fn test_write_needing_response_is_acknowledged() {
        let (mut conn, mut io) = open_connection();
        write(&mut conn, &mut io, WRITE_NEEDS_RESPONSE, b"hello");
        assert_eq!(io.shown, b"hello");
        assert_eq!(io.sent.len(), 1);
        assert_eq!(io.sent[0][OFF_PRIMITIVE], PRIM_WRITE);
        assert_eq!(io_response(&io.sent[0]), (3, RESP_SUCCESSFUL, COMP_SUCCESSFUL, 0, Vec::new()));
    }

    #[test]
    fn test_carriage_control_table() {
        assert_eq!(carriage_control_bytes(CCTL_NONE), b"");
        assert_eq!(carriage_control_bytes(CCTL_NO_SPACE), b"\r");
        assert_eq!(carriage_control_bytes(CCTL_SKIP_BASE), b"\r");
        assert_eq!(carriage_control_bytes(0x83), b"\r\n\n\n");
        assert_eq!(carriage_control_bytes(CCTL_DOUBLE), b"\r\n\n");
        assert_eq!(carriage_control_bytes(CCTL_TRIPLE), b"\r\n\n\n");
        assert_eq!(carriage_control_bytes(CCTL_TRIPLE_ALT), b"\r\n\n\n");
        assert_eq!(carriage_control_bytes(CCTL_FORM_FEED), [CR, FF]);
        assert_eq!(carriage_control_bytes(b' '), b"\r\n");
    }

    #[test]
    fn test_set_break_updates_flags_and_answers_failed() {
        let (mut conn, mut io) = open_connection();
        let req = SetBreakRequest { request_count: 4, index: SET_BREAK_SUBSYSTEM, enable: false };
        conn.receive(&req.encode(), &mut io).unwrap();
        assert!(!conn.settings().subsys_break_enabled);
        assert!(conn.settings().sys_break_enabled);
        let rec = &io.sent[0];
        assert_eq!(rec.len(), terminal_cntl::SET_BREAK_RESP_LEN);
        assert_eq!(rec[OFF_PRIMITIVE], PRIM_SET_BREAK);
        assert_eq!(u16_at(rec, terminal_cntl::REQUEST_COUNT), 4);
        assert_eq!(u16_at(rec, terminal_cntl::RESPONSE_CODE), RESP_FAILED);
    }

    #[test]
    fn test_driver_control_echo_and_edit_mode() {
        let (mut conn, mut io) = open_connection();
        let (code, status) = driver(
            &mut conn,
            &mut io,
            DriverControlRequest {
                request_count: 5,
                request_mask: DRV_MASK_ECHO | DRV_MASK_EDIT_MODE,
                echo: ECHO_CONTROL_OFF,
                edit_mode: EDIT_MODE_UNEDITED,
                term_char: b'!',
                ..Default::default()
            },
        );
        assert_eq!(code, RESP_SUCCESSFUL);
        assert_eq!(status, DRV_MASK_ECHO | DRV_MASK_EDIT_MODE);
        assert!(!conn.settings().echo_enabled);
        assert!(conn.settings().unedited);
        assert_eq!(conn.settings().primary_terminator, b'!');

        driver(
            &mut conn,
            &mut io,
            DriverControlRequest { request_mask: DRV_MASK_EDIT_MODE, edit_mode: EDIT_MODE_EDITED, ..Default::default() },
        );
        assert!(!conn.settings().unedited);
        assert_eq!(conn.settings().primary_terminator, CR);

        driver(
            &mut conn,
            &mut io,
            DriverControlRequest { request_mask: DRV_MASK_EDIT_MODE, edit_mode: EDIT_MODE_BINARY, ..Default::default() },
        );
        assert!(conn.settings().binary);
    }

    #[test]
    fn test_driver_control_refuses_block_mode_when_unsupported() {
        let (mut conn, mut io) = open_connection();
        let (code, status) = driver(
            &mut conn,
            &mut io,
            DriverControlRequest { request_mask: DRV_MASK_DRIVER_MODE, driver_mode: DRIVER_MODE_BLOCK, ..Default::default() },
        );
        assert_eq!(code, RESP_BAD_OP);
        assert_ne!(status & DRV_STATUS_DRIVER_MODE_FAILED, 0);
        assert_eq!(conn.settings().driver_mode, DriverMode::Vanilla);
    }

    #[test]
    fn test_driver_control_enters_block_mode_when_supported() {
        let (mut conn, mut io) = open_connection();
        conn.settings_mut().block_mode_supported = true;
        let (code, status) = driver(
            &mut conn,
            &mut io,
            DriverControlRequest { request_mask: DRV_MASK_DRIVER_MODE, driver_mode: DRIVER_MODE_BLOCK, ..Default::default() },
        );
        assert_eq!(code, RESP_SUCCESSFUL);
        assert_eq!(status, DRV_MASK_DRIVER_MODE);
        assert_eq!(conn.settings().driver_mode, DriverMode::Block);

        write(&mut conn, &mut io, 0, b"form");
        assert_eq!(io.output, vec![b"form".to_vec()]);
    }

    #[test]
    fn test_driver_control_terminator_data_stream_and_line_echo() {
        let (mut conn, mut io) = open_connection();
        let (code, status) = driver(
            &mut conn,
            &mut io,
            DriverControlRequest {
                request_mask: DRV_MASK_TERM_CHAR | DRV_MASK_DATA_STREAM | DRV_MASK_ECHO_LINE,
                term_char: b'%',
                echo_line_delete: 0,
                ..Default::default()
            },
        );
        assert_eq!(code, RESP_SUCCESSFUL);
        assert_ne!(status & DRV_STATUS_DATA_STREAM_FAILED, 0);
        assert_ne!(status & DRV_MASK_ECHO_LINE, 0);
        assert_eq!(conn.settings().alternate_terminator, b'%');
        assert!(!conn.settings().line_delete_echo_enabled);
    }

    #[test]
    fn test_mpe_control_records_settings() {
        let (mut conn, mut io) = open_connection();
        let req = MpeControlRequest {
            request_count: 6,
            request_mask: MPE_MASK_TERM_TYPE | MPE_MASK_TYPE_AHEAD,
            term_type: 10,
            type_ahead: 1,
        };
        conn.receive(&req.encode(), &mut io).unwrap();
        assert_eq!(conn.settings().term_type, 10);
        assert!(conn.settings().type_ahead);
        let rec = &io.sent[0];
        assert_eq!(rec.len(), mpe_cntl::RESP_LEN);
        assert_eq!(rec[OFF_MESSAGE_TYPE], MSG_MPE_CNTL_RESP);
        assert_eq!(u16_at(rec, mpe_cntl::REQUEST_COUNT), 6);
        assert_eq!(u16_at(rec, mpe_cntl::RESPONSE_CODE), RESP_FAILED);
    }

    #[test]
    fn test_generic_fdc_is_echoed_back() {
        let (mut conn, mut io) = open_connection();
        let req = FdcRequest { request_count: 7, function: 0x0102_0304, buffer: &[9, 8, 7] };
        conn.receive(&req.encode(), &mut io).unwrap();
        let rec = &io.sent[0];
        assert_eq!(rec[OFF_MESSAGE_TYPE], MSG_GENERIC_FDC_RESP);
        assert_eq!(u16_at(rec, generic_fdc::REQUEST_COUNT), 7);
        assert_eq!(&rec[generic_fdc::RESP_FUNCTION..generic_fdc::RESP_FUNCTION + 4], &[1, 2, 3, 4]);
        assert_eq!(u16_at(rec, generic_fdc::RESP_LENGTH), 3);
        assert_eq!(u16_at(rec, generic_fdc::ERROR_CODE), RESP_NO_ERROR);
        assert_eq!(&rec[generic_fdc::RESP_BUFFER..], &[9, 8, 7]);
    }

    #[test]
    fn test_generic_fdc_filling_the_buffer_keeps_the_session() {
        let (mut conn, mut io) = open_connection();
        let payload = vec![0x5a; conn.receive_buffer_size() - generic_fdc::REQ_LEN];
        let req = FdcRequest { request_count: 9, function: 1, buffer: &payload };
        let events = conn.receive(&req.encode(), &mut io).unwrap();

        assert!(events.is_empty());
        assert!(conn.is_open());
        assert_eq!(io.sent.len(), 1);
        let rec = &io.sent[0];
        assert_eq!(rec[OFF_MESSAGE_TYPE], MSG_GENERIC_FDC_RESP);
        assert_eq!(rec.len(), conn.send_buffer_size());
        let echoed = conn.send_buffer_size() - generic_fdc::RESP_HEADER_LEN;
        assert_eq!(u16_at(rec, generic_fdc::RESP_LENGTH) as usize, echoed);
        assert_eq!(&rec[generic_fdc::RESP_BUFFER..], &payload[..echoed]);

        // Still serving requests
        io.clear();
        post_read(&mut conn, &mut io, 10, 80, 0);
        conn.send_data(b"ok", COMP_SUCCESSFUL, &mut io).unwrap();
        assert_eq!(io_response(&io.sent[0]).4, b"ok".to_vec());
    }

    #[test]
    fn test_logon_info_is_declined() {
        let (mut conn, mut io) = open_connection();
        let req = SimpleMessage { message_type: MSG_ENV_CNTL_REQ, primitive: PRIM_LOGON_INFO, request_count: 8, code: None };
        conn.receive(&req.encode(), &mut io).unwrap();
        let rec = &io.sent[0];
        assert_eq!(rec.len(), env_cntl::RESP_LEN);
        assert_eq!((rec[OFF_MESSAGE_TYPE], rec[OFF_PRIMITIVE]), (MSG_ENV_CNTL_RESP, PRIM_LOGON_INFO));
        assert_eq!(u16_at(rec, env_cntl::REQUEST_COUNT), 8);
        assert_eq!(u16_at(rec, env_cntl::CODE), LOGON_INFO_FAILED);
    }

    #[test]
    fn test_host_terminate_is_answered_and_shuts_down() {
        let (mut conn, mut io) = open_connection();
        post_read(&mut conn, &mut io, 2, 80, 0);
        let req = SimpleMessage { message_type: MSG_ENV_CNTL_REQ, primitive: PRIM_TERMINATE, request_count: 11, code: None };
        let events = conn.receive(&req.encode(), &mut io).unwrap();
        assert_eq!(events, vec![Event::HostTerminated]);
        assert_eq!(conn.state(), ConnectionState::Shutdown);
        assert!(!conn.read_in_progress());
        let rec = &io.sent[0];
        assert_eq!((rec[OFF_MESSAGE_TYPE], rec[OFF_PRIMITIVE]), (MSG_ENV_CNTL_RESP, PRIM_TERMINATE));
        assert_eq!(u16_at(rec, env_cntl::CODE), RESP_NO_ERROR);

        io.clear();
        write(&mut conn, &mut io, 0, b"late");
        assert!(io.shown.is_empty());
    }

    #[test]
    fn test_local_terminate_sends_request_once() {
        let (mut conn, mut io) = open_connection();
        conn.terminate(&mut io);
        conn.terminate(&mut io);
        assert_eq!(io.sent.len(), 1);
        assert_eq!((io.sent[0][OFF_MESSAGE_TYPE], io.sent[0][OFF_PRIMITIVE]), (MSG_ENV_CNTL_REQ, PRIM_TERMINATE));
        assert!(conn.is_shutdown());
    }

    #[test]
    fn test_violations_are_counted_and_survived() {
        let (mut conn, mut io) = open_connection();
        let stray = IoResponse {
            primitive: PRIM_READ,
            request_count: 1,
            response_code: 0,
            completion_mask: 0,
            data: Vec::new(),
        };
        let events = conn.receive(&stray.encode(), &mut io).unwrap();
        assert_eq!(events, vec![Event::Violation(ProtocolViolation::UnexpectedIoResponse)]);

        let mut bogus = SimpleMessage { message_type: 0, primitive: 0, request_count: 1, code: None }.encode();
        bogus[OFF_MESSAGE_TYPE] = 0x40;
        conn.receive(&bogus, &mut io).unwrap();
        assert_eq!(conn.last_violation(), Some(ProtocolViolation::InvalidMessageType { message_type: 0x40 }));
        assert_eq!(conn.violation_count(), 2);
        assert!(conn.is_open());
        assert!(io.sent.is_empty());
    }

    #[test]
    fn test_completion_without_read_is_violation() {
        let (mut conn, mut io) = open_connection();
        let err = conn.send_data(b"x", COMP_SUCCESSFUL, &mut io).unwrap_err();
        assert!(matches!(err, VtError::Protocol(ProtocolViolation::NoReadOutstanding)));
        assert!(!err.is_fatal());
        assert_eq!(conn.violation_count(), 1);
        assert!(io.sent.is_empty());
    }
}
