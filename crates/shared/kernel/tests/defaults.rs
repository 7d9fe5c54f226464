use gatekit_kernel::config::load_gate_config;
use serial_test::serial;

#[test]
#[serial]
fn implicit_config_file_is_optional() {
    let cfg = load_gate_config(None::<&str>).expect("defaults should load without a file");
    assert_eq!(cfg.stacks.default_session, "main");
    assert!(cfg.dispatch.notify_observers);
}
