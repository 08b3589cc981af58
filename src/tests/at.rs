use crate::tests::mock::{bridge, connect_peer, exec};

#[test]
fn test_at_replies_ok() {
    let (mut bridge, _h) = bridge();

    assert_eq!(b"\r\nOK\r\n".to_vec(), exec(&mut bridge, "AT"));

    let entries: Vec<&str> = bridge.history.iter().collect();
    assert_eq!(vec!["AT"], entries);
}

#[test]
fn test_unknown_command_replies_error() {
    let (mut bridge, _h) = bridge();

    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+NOPE"));
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "garbage"));
}

#[test]
fn test_empty_line_is_silent() {
    let (mut bridge, _h) = bridge();

    assert!(exec(&mut bridge, "").is_empty());
    assert!(bridge.history.is_empty());
}

#[test]
fn test_malformed_line_still_recorded() {
    let (mut bridge, _h) = bridge();

    exec(&mut bridge, "AT+NOPE");

    let entries: Vec<&str> = bridge.history.iter().collect();
    assert_eq!(vec!["AT+NOPE"], entries);
}

#[test]
fn test_noop_commands() {
    let (mut bridge, _h) = bridge();

    assert_eq!(b"\r\nOK\r\n".to_vec(), exec(&mut bridge, "AT+CWMODE=1"));
    assert_eq!(b"\r\nOK\r\n".to_vec(), exec(&mut bridge, "AT+CIPMUX=1"));
    assert_eq!(
        b"\r\nOK\r\n".to_vec(),
        exec(&mut bridge, "AT+CIPSTA=\"192.168.1.2\"")
    );

    // only the exact supported forms pass
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CWMODE=2"));
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPMUX=0"));
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPSTA="));
}

#[test]
fn test_commands_are_case_sensitive() {
    let (mut bridge, _h) = bridge();

    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "at"));
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "At+rst"));
}

#[test]
fn test_reset_banner_and_teardown() {
    let (mut bridge, h) = bridge();
    exec(&mut bridge, "AT+CIPSERVER=1,8081");
    let peer = connect_peer(&mut bridge, &h);
    bridge.link.take_tx();

    let reply = exec(&mut bridge, "AT+RST");

    assert_eq!(b"\r\nOK\r\n...bla-bla-bla...\r\nready\r\n".to_vec(), reply);
    assert!(!bridge.server.is_running());
    assert_eq!(0, bridge.slots.count());
    assert_eq!(Some(0), bridge.recovery.load());
    // the teardown is silent, the peer just finds its socket closed
    assert_eq!(1, std::rc::Rc::strong_count(&peer));
}

#[test]
fn test_query_ap_without_association() {
    let (mut bridge, _h) = bridge();

    assert_eq!(
        b"No AP\r\n\r\nERROR\r\n".to_vec(),
        exec(&mut bridge, "AT+CWJAP?")
    );
}

#[test]
fn test_query_ap_reports_ssid() {
    let (mut bridge, _h) = bridge();
    exec(&mut bridge, "AT+CWJAP=\"test_wifi\",\"secret\"");

    assert_eq!(
        b"+CWJAP:\"test_wifi\"\r\n\r\nOK\r\n".to_vec(),
        exec(&mut bridge, "AT+CWJAP?")
    );
}

#[test]
fn test_query_ap_escapes_special_characters() {
    let (mut bridge, _h) = bridge();
    // ssid is a"b,c\d on the wire
    exec(&mut bridge, "AT+CWJAP=\"a\\\"b,c\\\\d\",\"p\"");

    assert_eq!(
        b"+CWJAP:\"a\\\"b\\,c\\\\d\"\r\n\r\nOK\r\n".to_vec(),
        exec(&mut bridge, "AT+CWJAP?")
    );
}

#[test]
fn test_join_persists_and_associates() {
    let (mut bridge, h) = bridge();

    let reply = exec(&mut bridge, "AT+CWJAP=\"test_wifi\",\"secret\"");

    assert_eq!(b"\r\nOK\r\n".to_vec(), reply);
    assert!(h.store.borrow().is_some());
    assert_eq!(
        vec![("test_wifi".to_string(), "secret".to_string())],
        bridge.wifi.reassociations
    );

    let creds = bridge.creds.current().unwrap();
    assert_eq!("test_wifi", creds.ssid.as_str());
    assert_eq!("secret", creds.password.as_str());
}

#[test]
fn test_join_redacts_history() {
    let (mut bridge, _h) = bridge();

    exec(&mut bridge, "AT+CWJAP=\"test_wifi\",\"secret\"");

    let entries: Vec<&str> = bridge.history.iter().collect();
    assert_eq!(vec!["AT+CWJAP=\"test_wifi\",\"*\""], entries);
}

#[test]
fn test_join_failure_still_persists() {
    let (mut bridge, h) = bridge();
    bridge.wifi.join_result = false;

    let reply = exec(&mut bridge, "AT+CWJAP=\"test_wifi\",\"secret\"");

    assert_eq!(b"+CWJAP:1\r\n\r\nFAIL\r\n".to_vec(), reply);
    assert!(h.store.borrow().is_some());
    assert_eq!("test_wifi", bridge.creds.current().unwrap().ssid.as_str());
}

#[test]
fn test_join_unchanged_pair_skips_reassociation() {
    let (mut bridge, _h) = bridge();
    exec(&mut bridge, "AT+CWJAP=\"test_wifi\",\"secret\"");
    bridge.wifi.reassociations.clear();

    let reply = exec(&mut bridge, "AT+CWJAP=\"test_wifi\",\"secret\"");

    assert_eq!(b"\r\nOK\r\n".to_vec(), reply);
    assert!(bridge.wifi.reassociations.is_empty());
    // the bounded wait still ran for both commands
    assert_eq!(2, bridge.wifi.wait_calls);
}

#[test]
fn test_join_changed_pair_reassociates() {
    let (mut bridge, _h) = bridge();
    exec(&mut bridge, "AT+CWJAP=\"test_wifi\",\"secret\"");

    exec(&mut bridge, "AT+CWJAP=\"test_wifi\",\"other\"");

    assert_eq!(2, bridge.wifi.reassociations.len());
    assert_eq!("other", bridge.creds.current().unwrap().password.as_str());
}

#[test]
fn test_join_missing_leading_quote_keeps_raw_history() {
    let (mut bridge, h) = bridge();

    let reply = exec(&mut bridge, "AT+CWJAP=net,\"secret\"");

    assert_eq!(b"\r\nERROR\r\n".to_vec(), reply);
    assert!(h.store.borrow().is_none());

    // parsing failed before the password offset was known
    let entries: Vec<&str> = bridge.history.iter().collect();
    assert_eq!(vec!["AT+CWJAP=net,\"secret\""], entries);
}

#[test]
fn test_join_missing_delimiter_fails() {
    let (mut bridge, _h) = bridge();

    assert_eq!(
        b"\r\nERROR\r\n".to_vec(),
        exec(&mut bridge, "AT+CWJAP=\"net\"\"secret\"")
    );
}

#[test]
fn test_join_missing_closing_quote_fails_but_redacts() {
    let (mut bridge, h) = bridge();

    let reply = exec(&mut bridge, "AT+CWJAP=\"net\",\"secret");

    assert_eq!(b"\r\nERROR\r\n".to_vec(), reply);
    assert!(h.store.borrow().is_none());

    let entries: Vec<&str> = bridge.history.iter().collect();
    assert_eq!(vec!["AT+CWJAP=\"net\",\"*\""], entries);
}

#[test]
fn test_join_escaped_quote_in_password() {
    let (mut bridge, _h) = bridge();

    exec(&mut bridge, "AT+CWJAP=\"net\",\"a\\\"b\"");

    assert_eq!("a\"b", bridge.creds.current().unwrap().password.as_str());
}

#[test]
fn test_join_overlong_ssid_is_cut() {
    let (mut bridge, _h) = bridge();
    let line = format!("AT+CWJAP=\"{}\",\"secret\"", "a".repeat(40));

    let reply = exec(&mut bridge, &line);

    assert_eq!(b"\r\nOK\r\n".to_vec(), reply);
    assert_eq!(32, bridge.creds.current().unwrap().ssid.len());
}

#[test]
fn test_server_start() {
    let (mut bridge, h) = bridge();

    let reply = exec(&mut bridge, "AT+CIPSERVER=1,8081");

    assert_eq!(b"\r\nOK\r\n".to_vec(), reply);
    assert_eq!(vec![8081], h.stack.borrow().bound);
    assert_eq!(Some(8081), bridge.recovery.load());
    assert!(bridge.server.is_running());
}

#[test]
fn test_server_rejects_diagnostics_port() {
    let (mut bridge, h) = bridge();

    let reply = exec(&mut bridge, "AT+CIPSERVER=1,8080");

    assert_eq!(b"\r\nERROR\r\n".to_vec(), reply);
    assert!(h.stack.borrow().bound.is_empty());
}

#[test]
fn test_server_rejects_out_of_range_ports() {
    let (mut bridge, _h) = bridge();

    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPSERVER=1,0"));
    assert_eq!(
        b"\r\nERROR\r\n".to_vec(),
        exec(&mut bridge, "AT+CIPSERVER=1,65536")
    );
    assert_eq!(
        b"\r\nERROR\r\n".to_vec(),
        exec(&mut bridge, "AT+CIPSERVER=1,-1")
    );
}

#[test]
fn test_server_rejects_second_listener() {
    let (mut bridge, h) = bridge();
    exec(&mut bridge, "AT+CIPSERVER=1,8081");

    let reply = exec(&mut bridge, "AT+CIPSERVER=1,8082");

    assert_eq!(b"\r\nERROR\r\n".to_vec(), reply);
    assert_eq!(vec![8081], h.stack.borrow().bound);
}

#[test]
fn test_server_rejects_malformed_arguments() {
    let (mut bridge, _h) = bridge();

    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPSERVER="));
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPSERVER=x"));
    assert_eq!(
        b"\r\nERROR\r\n".to_vec(),
        exec(&mut bridge, "AT+CIPSERVER=2,8081")
    );
    assert_eq!(
        b"\r\nERROR\r\n".to_vec(),
        exec(&mut bridge, "AT+CIPSERVER=1,8081xyz")
    );
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPSERVER=1"));
}

#[test]
fn test_server_stop_is_idempotent() {
    let (mut bridge, _h) = bridge();

    assert_eq!(b"\r\nOK\r\n".to_vec(), exec(&mut bridge, "AT+CIPSERVER=0"));
    assert_eq!(Some(0), bridge.recovery.load());
    assert_eq!(b"\r\nOK\r\n".to_vec(), exec(&mut bridge, "AT+CIPSERVER=0"));
}

#[test]
fn test_server_stop_drops_connections_silently() {
    let (mut bridge, h) = bridge();
    exec(&mut bridge, "AT+CIPSERVER=1,8081");
    let peer = connect_peer(&mut bridge, &h);
    bridge.link.take_tx();

    let reply = exec(&mut bridge, "AT+CIPSERVER=0");

    assert_eq!(b"\r\nOK\r\n".to_vec(), reply);
    assert_eq!(0, bridge.slots.count());
    assert_eq!(Some(0), bridge.recovery.load());
    assert_eq!(1, std::rc::Rc::strong_count(&peer));
}

#[test]
fn test_close_rejects_bad_slot() {
    let (mut bridge, _h) = bridge();

    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPCLOSE=16"));
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPCLOSE=-1"));
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPCLOSE=abc"));
}

#[test]
fn test_close_unoccupied_slot() {
    let (mut bridge, _h) = bridge();

    assert_eq!(
        b"link is not\r\n\r\nERROR\r\n".to_vec(),
        exec(&mut bridge, "AT+CIPCLOSE=0")
    );
}

#[test]
fn test_close_occupied_slot() {
    let (mut bridge, h) = bridge();
    exec(&mut bridge, "AT+CIPSERVER=1,8081");
    let peer = connect_peer(&mut bridge, &h);
    bridge.link.take_tx();

    let reply = exec(&mut bridge, "AT+CIPCLOSE=0");

    assert_eq!(b"0,CLOSED\r\n\r\nOK\r\n".to_vec(), reply);
    assert!(!bridge.slots.is_occupied(0));
    assert_eq!(1, std::rc::Rc::strong_count(&peer));
}

#[test]
fn test_send_to_unoccupied_slot() {
    let (mut bridge, _h) = bridge();

    assert_eq!(
        b"link is not\r\n\r\nERROR\r\n".to_vec(),
        exec(&mut bridge, "AT+CIPSEND=0,2")
    );
    assert!(bridge.pending.is_none());
}

#[test]
fn test_send_to_disconnected_slot() {
    let (mut bridge, h) = bridge();
    exec(&mut bridge, "AT+CIPSERVER=1,8081");
    let peer = connect_peer(&mut bridge, &h);
    bridge.link.take_tx();
    peer.borrow_mut().connected = false;

    // the drain pass notices the disconnect first
    let reply = exec(&mut bridge, "AT+CIPSEND=0,2");

    assert!(reply.starts_with(b"link is not\r\n\r\nERROR\r\n"));
    assert!(bridge.pending.is_none());
}

#[test]
fn test_send_rejects_malformed_arguments() {
    let (mut bridge, _h) = bridge();

    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPSEND=0"));
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPSEND=0,x"));
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPSEND=17,2"));
    assert_eq!(b"\r\nERROR\r\n".to_vec(), exec(&mut bridge, "AT+CIPSEND=0,-2"));
}

#[test]
fn test_send_too_long_never_arms() {
    let (mut bridge, h) = bridge();
    exec(&mut bridge, "AT+CIPSERVER=1,8081");
    connect_peer(&mut bridge, &h);
    bridge.link.take_tx();

    let reply = exec(&mut bridge, "AT+CIPSEND=0,4096");

    assert_eq!(b"too long\r\n\r\nERROR\r\n".to_vec(), reply);
    assert!(bridge.pending.is_none());
}

#[test]
fn test_send_zero_length_completes_immediately() {
    let (mut bridge, h) = bridge();
    exec(&mut bridge, "AT+CIPSERVER=1,8081");
    let peer = connect_peer(&mut bridge, &h);
    bridge.link.take_tx();

    let reply = exec(&mut bridge, "AT+CIPSEND=0,0");

    assert_eq!(b"> \r\nSEND OK\r\n".to_vec(), reply);
    assert!(bridge.pending.is_none());
    assert!(peer.borrow().sent.is_empty());
}

#[test]
fn test_send_collects_and_forwards() {
    let (mut bridge, h) = bridge();
    exec(&mut bridge, "AT+CIPSERVER=1,8081");
    let peer = connect_peer(&mut bridge, &h);
    bridge.link.take_tx();

    let reply = exec(&mut bridge, "AT+CIPSEND=0,2");
    assert_eq!(b"> ".to_vec(), reply);
    assert!(bridge.pending.is_some());

    bridge.link.inject(b"ok");
    bridge.poll_once().unwrap();

    assert_eq!(b"\r\nSEND OK\r\n".to_vec(), bridge.link.take_tx());
    assert_eq!(b"ok".to_vec(), peer.borrow().sent);
    assert!(bridge.pending.is_none());
}

#[test]
fn test_send_payload_is_not_parsed_as_commands() {
    let (mut bridge, h) = bridge();
    exec(&mut bridge, "AT+CIPSERVER=1,8081");
    let peer = connect_peer(&mut bridge, &h);
    bridge.link.take_tx();

    exec(&mut bridge, "AT+CIPSEND=0,4");
    bridge.link.inject(b"AT\r\n");
    bridge.poll_once().unwrap();

    assert_eq!(b"\r\nSEND OK\r\n".to_vec(), bridge.link.take_tx());
    assert_eq!(b"AT\r\n".to_vec(), peer.borrow().sent);

    // only the two real commands made it into the history
    let entries: Vec<&str> = bridge.history.iter().collect();
    assert_eq!(vec!["AT+CIPSERVER=1,8081", "AT+CIPSEND=0,4"], entries);
}
