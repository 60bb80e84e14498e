//! End-to-end bridge tests
//!
//! Drives the full path a foreign caller takes: encoded argument text in,
//! encoded result or error-sentinel payload out. The calculator object
//! below stands in for the construction collaborator's domain object.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_core::{
    decode_record, encode_record, Arg, Bridge, BridgeResult, Expose, FromArg, IntoResults,
    IntoValue, Methods, RecordDesc, TypeDesc, Value,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TrainPlan {
    epochs: i64,
    rate: f64,
}

impl FromArg for TrainPlan {
    fn descriptor() -> TypeDesc {
        TypeDesc::Record(
            RecordDesc::builder("TrainPlan")
                .field("epochs", TypeDesc::INT)
                .field("rate", TypeDesc::FLOAT)
                .build(),
        )
    }

    fn from_arg(arg: Arg, index: usize) -> BridgeResult<Self> {
        decode_record(arg, "TrainPlan", index)
    }
}

impl IntoValue for TrainPlan {
    fn descriptor() -> TypeDesc {
        <TrainPlan as FromArg>::descriptor()
    }

    fn into_value(self) -> Value {
        encode_record(&self)
    }
}

impl IntoResults for TrainPlan {
    fn descriptors() -> Vec<TypeDesc> {
        vec![<TrainPlan as IntoValue>::descriptor()]
    }

    fn into_results(self) -> BridgeResult<Vec<Value>> {
        Ok(vec![self.into_value()])
    }
}

#[derive(Default)]
struct Calculator {
    plan: Option<TrainPlan>,
    pause: Duration,
}

impl Expose for Calculator {
    fn expose(methods: &mut Methods<Self>) {
        methods.register("Add", |_c: &mut Calculator, a: i64, b: i64| a + b);
        methods.register("Sum", |_c: &mut Calculator, values: Vec<f64>| {
            values.iter().sum::<f64>()
        });
        methods.register("Scale", |_c: &mut Calculator, rows: Vec<Vec<f64>>, factor: f64| {
            rows.into_iter()
                .map(|row| row.into_iter().map(|v| v * factor).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        });
        methods.register("Weigh", |_c: &mut Calculator, weights: HashMap<String, f64>| {
            weights.values().sum::<f64>()
        });
        methods.register("SetPlan", |c: &mut Calculator, plan: TrainPlan| {
            c.plan = Some(plan);
        });
        methods.register("Plan", |c: &mut Calculator| -> Result<TrainPlan, String> {
            c.plan.clone().ok_or_else(|| "no plan set".to_string())
        });
        methods.register("SetPause", |c: &mut Calculator, pause: Duration| {
            c.pause = pause;
        });
        methods.register("Pause", |c: &mut Calculator| c.pause);
        methods.register("DivMod", |_c: &mut Calculator, a: i64, b: i64| {
            (a / b, a % b)
        });
        methods.register("Explode", |_c: &mut Calculator| -> i64 {
            panic!("deliberate failure")
        });
        methods.register("Leak", |_c: &mut Calculator| {
            let mut out = std::collections::BTreeMap::new();
            out.insert("error".to_string(), "not really".to_string());
            out
        });
    }
}

fn payload_error(payload: &str) -> Option<String> {
    let value = Value::from_json(payload).unwrap();
    value
        .as_mapping()
        .and_then(|m| m.get("error"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[test]
fn test_add_round_trip() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    assert_eq!(bridge.invoke(handle, "Add", "[2,3]"), "[5]");
}

#[test]
fn test_arity_mismatch_skips_coercion() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());

    // Wrong count with a value that would also fail coercion: the arity
    // error wins because coercion never runs
    let payload = bridge.invoke(handle, "Add", r#"["not a number"]"#);
    assert_eq!(
        payload_error(&payload).unwrap(),
        "expected 2 parameters, got 1"
    );

    let payload = bridge.invoke(handle, "Add", "[1,2,3]");
    assert_eq!(
        payload_error(&payload).unwrap(),
        "expected 2 parameters, got 3"
    );
}

#[test]
fn test_unknown_handle() {
    let bridge = Bridge::new();
    bridge.register(Calculator::default());
    let payload = bridge.invoke(999_999, "Add", "[2,3]");
    assert_eq!(payload_error(&payload).unwrap(), "unknown handle 999999");
}

#[test]
fn test_unknown_method() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    let payload = bridge.invoke(handle, "Multiply", "[2,3]");
    assert_eq!(
        payload_error(&payload).unwrap(),
        "method not found: Multiply"
    );
}

#[test]
fn test_coercion_error_carries_index() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    let payload = bridge.invoke(handle, "Add", r#"[2, "three"]"#);
    assert_eq!(
        payload_error(&payload).unwrap(),
        "parameter 1: expected int, got string"
    );
}

#[test]
fn test_malformed_argument_text() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    let payload = bridge.invoke(handle, "Add", "[2, ");
    assert!(payload_error(&payload)
        .unwrap()
        .starts_with("invalid argument text:"));
}

#[test]
fn test_bare_number_feeds_sequence_parameter() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    // A single number wraps into a one-element vector argument
    assert_eq!(bridge.invoke(handle, "Sum", "[4.5]"), "[4.5]");
    assert_eq!(bridge.invoke(handle, "Sum", "4.5"), "[4.5]");
}

#[test]
fn test_nested_sequences() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    let payload = bridge.invoke(handle, "Scale", "[[[1,2],[3]], 2]");
    assert_eq!(payload, "[[[2,4],[6]]]");
}

#[test]
fn test_string_keyed_map_parameter() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    let payload = bridge.invoke(handle, "Weigh", r#"[{"a": 1.5, "b": 2.5}]"#);
    assert_eq!(payload, "[4.0]");
}

#[test]
fn test_record_round_trip() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());

    let payload = bridge.invoke(handle, "Plan", "[]");
    assert_eq!(payload_error(&payload).unwrap(), "invocation fault: no plan set");

    assert_eq!(
        bridge.invoke(handle, "SetPlan", r#"[{"epochs": 10, "rate": 0.5}]"#),
        "[]"
    );
    assert_eq!(
        bridge.invoke(handle, "Plan", "[]"),
        r#"[{"epochs":10,"rate":0.5}]"#
    );
}

#[test]
fn test_record_decode_error() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    let payload = bridge.invoke(handle, "SetPlan", r#"[{"epochs": "ten", "rate": 0.5}]"#);
    let message = payload_error(&payload).unwrap();
    assert!(message.starts_with("parameter 0: expected TrainPlan"));
}

#[test]
fn test_duration_parameter_counts_nanoseconds() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    assert_eq!(bridge.invoke(handle, "SetPause", "[1500000000]"), "[]");
    assert_eq!(bridge.invoke(handle, "Pause", ""), "[1500000000]");
}

#[test]
fn test_multiple_results() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    assert_eq!(bridge.invoke(handle, "DivMod", "[17, 5]"), "[3,2]");
}

#[test]
fn test_panic_is_isolated() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());

    let payload = bridge.invoke(handle, "Explode", "");
    assert_eq!(
        payload_error(&payload).unwrap(),
        "invocation fault: deliberate failure"
    );

    // The bridge and the object both survive the fault
    assert_eq!(bridge.invoke(handle, "Add", "[1,1]"), "[2]");
}

#[test]
fn test_reserved_result_key_is_refused() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    let payload = bridge.invoke(handle, "Leak", "");
    assert_eq!(
        payload_error(&payload).unwrap(),
        "result field name \"error\" is reserved for the error sentinel"
    );
}

#[test]
fn test_success_payload_is_never_a_sentinel() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    for (method, args) in [("Add", "[1,2]"), ("Sum", "[[1,2]]"), ("DivMod", "[9,4]")] {
        let payload = bridge.invoke(handle, method, args);
        assert!(payload_error(&payload).is_none(), "sentinel in {payload}");
    }
}

#[test]
fn test_describe_reports_signatures() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    let report = bridge.describe(handle).unwrap();

    let add = report
        .methods
        .iter()
        .find(|entry| entry.name == "Add")
        .unwrap();
    assert_eq!(add.parameters, vec!["int", "int"]);
    assert_eq!(add.returns, vec!["int"]);

    let scale = report
        .methods
        .iter()
        .find(|entry| entry.name == "Scale")
        .unwrap();
    assert_eq!(scale.parameters, vec!["list<list<float>>", "float"]);

    let weigh = report
        .methods
        .iter()
        .find(|entry| entry.name == "Weigh")
        .unwrap();
    assert_eq!(weigh.parameters, vec!["map<string, float>"]);

    let plan = report
        .methods
        .iter()
        .find(|entry| entry.name == "Plan")
        .unwrap();
    assert_eq!(plan.returns, vec!["TrainPlan"]);

    assert_eq!(report.count, report.methods.len());
}

#[test]
fn test_describe_single_method_object() {
    struct Adder;

    impl Expose for Adder {
        fn expose(methods: &mut Methods<Self>) {
            methods.register("Add", |_a: &mut Adder, x: i64, y: i64| x + y);
        }
    }

    let bridge = Bridge::new();
    let handle = bridge.register(Adder);
    let report = bridge.describe(handle).unwrap();
    assert_eq!(report.count, 1);
    assert_eq!(report.methods[0].name, "Add");
    assert_eq!(report.methods[0].parameters.len(), 2);
    assert_eq!(report.methods[0].returns.len(), 1);
}

#[test]
fn test_describe_unknown_handle() {
    let bridge = Bridge::new();
    let payload = bridge.describe_json(424_242);
    assert_eq!(payload_error(&payload).unwrap(), "unknown handle 424242");
}

#[test]
fn test_info_report() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    let info = bridge.info(handle).unwrap();
    assert_eq!(info.handle, handle);
    assert!(info.type_name.ends_with("Calculator"));
    assert_eq!(info.methods, 11);

    let encoded = bridge.info_json(handle);
    let value = Value::from_json(&encoded).unwrap();
    assert!(value.as_mapping().unwrap().contains_key("type"));
}

#[test]
fn test_release_then_invoke() {
    let bridge = Bridge::new();
    let handle = bridge.register(Calculator::default());
    bridge.release(handle);
    bridge.release(handle); // second release is a no-op

    let payload = bridge.invoke(handle, "Add", "[1,2]");
    assert_eq!(
        payload_error(&payload).unwrap(),
        format!("unknown handle {handle}")
    );
}

#[test]
fn test_concurrent_invocations_on_distinct_handles() {
    use std::sync::Arc;

    let bridge = Arc::new(Bridge::new());
    let handles: Vec<_> = (0..4)
        .map(|_| bridge.register(Calculator::default()))
        .collect();

    let mut joins = Vec::new();
    for handle in handles {
        let bridge = Arc::clone(&bridge);
        joins.push(std::thread::spawn(move || {
            for _ in 0..100 {
                assert_eq!(bridge.invoke(handle, "Add", "[2,3]"), "[5]");
            }
        }));
    }
    for join in joins {
        join.join().unwrap();
    }
}
