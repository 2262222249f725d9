use super::store_test::new_store;
use super::store_test::string_val;
use super::*;
use crate::path::parse_xpath;
use crate::proto::gnmi::get_request::DataType;
use crate::proto::gnmi::typed_value;
use crate::proto::gnmi::GetRequest;
use crate::proto::gnmi::Path;
use crate::proto::gnmi::SetRequest;
use serde_json::json;
use tonic::Code;

fn get_request(paths: &[&str], data_type: DataType, encoding: Encoding) -> GetRequest {
    GetRequest {
        path: paths
            .iter()
            .map(|p| parse_xpath(p).expect("valid path"))
            .collect(),
        r#type: data_type as i32,
        encoding: encoding as i32,
        ..Default::default()
    }
}

fn seed_hostname(store: &ConfigStore, hostname: &str) {
    let req = SetRequest {
        replace: vec![Update {
            path: Some(parse_xpath("/system/config/hostname").expect("valid path")),
            val: Some(string_val(hostname)),
            duplicates: 0,
        }],
        ..Default::default()
    };
    store.set(&req).expect("seed hostname");
}

fn single_value(resp: &crate::proto::gnmi::GetResponse) -> &typed_value::Value {
    resp.notification[0].update[0]
        .val
        .as_ref()
        .and_then(|v| v.value.as_ref())
        .expect("update carries a value")
}

fn json_bytes(value: &typed_value::Value) -> serde_json::Value {
    let bytes = match value {
        typed_value::Value::JsonVal(b) | typed_value::Value::JsonIetfVal(b) => b,
        other => panic!("expected a JSON value, got {other:?}"),
    };
    serde_json::from_slice(bytes).expect("valid JSON payload")
}

#[test]
fn test_get_leaf_returns_string_value() {
    let store = new_store();
    seed_hostname(&store, "r1");
    let resp = store
        .get(&get_request(
            &["/system/config/hostname"],
            DataType::All,
            Encoding::JsonIetf,
        ))
        .expect("get succeeds");
    assert_eq!(
        single_value(&resp),
        &typed_value::Value::StringVal("r1".to_string())
    );
    assert!(resp.notification[0].timestamp > 0);
}

#[test]
fn test_get_missing_path_is_not_found() {
    let store = new_store();
    let err = store
        .get(&get_request(
            &["/system/openflow"],
            DataType::All,
            Encoding::JsonIetf,
        ))
        .expect_err("nothing stored");
    assert_eq!(err.code(), Code::NotFound);
}

#[test]
fn test_get_after_delete_is_not_found() {
    let store = new_store();
    store
        .set(&SetRequest {
            replace: vec![Update {
                path: Some(parse_xpath("/system/openflow/agent/config/datapath-id").expect("valid")),
                val: Some(string_val("00:00:00:00:00:01")),
                duplicates: 0,
            }],
            ..Default::default()
        })
        .expect("seed openflow");
    store
        .set(&SetRequest {
            delete: vec![parse_xpath("/system/openflow").expect("valid path")],
            ..Default::default()
        })
        .expect("delete openflow");
    let err = store
        .get(&get_request(
            &["/system/openflow"],
            DataType::All,
            Encoding::JsonIetf,
        ))
        .expect_err("deleted subtree");
    assert_eq!(err.code(), Code::NotFound);
}

#[test]
fn test_get_subtree_emits_ietf_json() {
    let store = new_store();
    seed_hostname(&store, "r1");
    let resp = store
        .get(&get_request(&["/system"], DataType::All, Encoding::JsonIetf))
        .expect("get subtree");
    match single_value(&resp) {
        v @ typed_value::Value::JsonIetfVal(_) => {
            assert_eq!(json_bytes(v), json!({"config": {"hostname": "r1"}}));
        }
        other => panic!("expected JSON-IETF value, got {other:?}"),
    }
}

#[test]
fn test_get_subtree_internal_json_encoding() {
    let store = new_store();
    seed_hostname(&store, "r1");
    let resp = store
        .get(&get_request(&["/system"], DataType::All, Encoding::Json))
        .expect("get subtree");
    assert!(matches!(
        single_value(&resp),
        typed_value::Value::JsonVal(_)
    ));
}

#[test]
fn test_get_whole_tree_when_no_paths_requested() {
    let store = new_store();
    seed_hostname(&store, "r1");
    let resp = store
        .get(&get_request(&[], DataType::All, Encoding::JsonIetf))
        .expect("whole tree");
    assert_eq!(
        json_bytes(single_value(&resp)),
        json!({"openconfig-system:system": {"config": {"hostname": "r1"}}})
    );
}

#[test]
fn test_get_whole_tree_pruned_by_config_type() {
    let store = new_store();
    seed_hostname(&store, "r1");
    store.write_datetime().expect("state leaf present");
    let resp = store
        .get(&get_request(&[], DataType::Config, Encoding::Json))
        .expect("pruned tree");
    assert_eq!(
        json_bytes(single_value(&resp)),
        json!({"system": {"config": {"hostname": "r1"}}})
    );
}

#[test]
fn test_get_root_round_trips_set_root_replace() {
    let store = new_store();
    let config = json!({
        "openconfig-system:system": {"config": {"hostname": "r1", "domain-name": "lab"}}
    });
    store
        .set(&SetRequest {
            replace: vec![Update {
                path: Some(Path::default()),
                val: Some(crate::proto::gnmi::TypedValue {
                    value: Some(typed_value::Value::JsonIetfVal(
                        serde_json::to_vec(&config).expect("serializable"),
                    )),
                }),
                duplicates: 0,
            }],
            ..Default::default()
        })
        .expect("root replace");
    let resp = store
        .get(&get_request(&["/"], DataType::All, Encoding::JsonIetf))
        .expect("root get");
    assert_eq!(json_bytes(single_value(&resp)), config);
}

#[test]
fn test_get_leaf_data_type_must_match_path() {
    let store = new_store();
    seed_hostname(&store, "r1");
    let err = store
        .get(&get_request(
            &["/system/config/hostname"],
            DataType::State,
            Encoding::JsonIetf,
        ))
        .expect_err("config leaf requested as state");
    assert_eq!(err.code(), Code::Internal);
    assert!(err.message().contains("dataType"));
}

#[test]
fn test_get_enum_leaf_emits_name_string() {
    let store = new_store();
    store
        .set(&SetRequest {
            replace: vec![Update {
                path: Some(
                    parse_xpath("/system/openflow/agent/config/failure-mode").expect("valid"),
                ),
                val: Some(string_val("SECURE")),
                duplicates: 0,
            }],
            ..Default::default()
        })
        .expect("seed enum leaf");
    let resp = store
        .get(&get_request(
            &["/system/openflow/agent/config/failure-mode"],
            DataType::All,
            Encoding::JsonIetf,
        ))
        .expect("get enum leaf");
    assert_eq!(
        single_value(&resp),
        &typed_value::Value::StringVal("SECURE".to_string())
    );
}

#[test]
fn test_get_unsupported_encoding_is_unimplemented() {
    let store = new_store();
    let err = store
        .get(&get_request(&["/system"], DataType::All, Encoding::Proto))
        .expect_err("PROTO encoding unsupported");
    assert_eq!(err.code(), Code::Unimplemented);
}

#[test]
fn test_get_use_models_is_unimplemented() {
    let store = new_store();
    seed_hostname(&store, "r1");
    let mut req = get_request(&["/system"], DataType::All, Encoding::JsonIetf);
    req.use_models = store.model().model_data().to_vec();
    let err = store.get(&req).expect_err("use_models filter");
    assert_eq!(err.code(), Code::Unimplemented);
}

#[test]
fn test_get_unknown_model_is_unimplemented() {
    let store = new_store();
    let mut req = get_request(&["/system"], DataType::All, Encoding::JsonIetf);
    req.use_models = vec![crate::proto::gnmi::ModelData {
        name: "openconfig-qos".to_string(),
        organization: "OpenConfig working group".to_string(),
        version: "1.0.0".to_string(),
    }];
    let err = store.get(&req).expect_err("unknown model");
    assert_eq!(err.code(), Code::Unimplemented);
}

#[test]
fn test_get_legacy_element_path_is_unimplemented() {
    let store = new_store();
    let req = GetRequest {
        path: vec![Path {
            element: vec!["system".to_string()],
            ..Default::default()
        }],
        ..Default::default()
    };
    assert_eq!(
        store.get(&req).expect_err("legacy path").code(),
        Code::Unimplemented
    );
}

#[test]
fn test_get_telemetry_path_prefers_cached_update() {
    let store = new_store();
    let telemetry = parse_xpath(crate::constants::TELEMETRY_PATH).expect("valid path");
    let cached = Update {
        path: Some(telemetry.clone()),
        val: Some(string_val("192.168.1.42")),
        duplicates: 0,
    };
    store.cache_telemetry_update(cached.clone());
    let resp = store
        .get(&get_request(
            &[crate::constants::TELEMETRY_PATH],
            DataType::All,
            Encoding::JsonIetf,
        ))
        .expect("cached telemetry");
    assert_eq!(resp.notification[0].update[0], cached);
}

#[test]
fn test_get_telemetry_path_falls_back_to_tree_before_first_event() {
    let store = new_store();
    let err = store
        .get(&get_request(
            &[crate::constants::TELEMETRY_PATH],
            DataType::All,
            Encoding::JsonIetf,
        ))
        .expect_err("nothing cached, nothing stored");
    assert_eq!(err.code(), Code::NotFound);
}

#[test]
fn test_get_update_refetches_leaf() {
    let store = new_store();
    seed_hostname(&store, "r1");
    let path = parse_xpath("/system/config/hostname").expect("valid path");
    let update = store.get_update(None, &path).expect("refetch");
    assert_eq!(
        update.val.and_then(|v| v.value),
        Some(typed_value::Value::StringVal("r1".to_string()))
    );
}

#[test]
fn test_get_update_composes_prefix() {
    let store = new_store();
    seed_hostname(&store, "r1");
    let prefix = parse_xpath("/system/config").expect("valid prefix");
    let path = parse_xpath("/hostname").expect("valid path");
    let update = store.get_update(Some(&prefix), &path).expect("refetch");
    // The reported path stays the subscription's own path.
    assert_eq!(
        crate::path::xpath(update.path.as_ref().expect("path echoed")),
        "/hostname"
    );
}

#[test]
fn test_get_update_missing_path_is_not_found() {
    let store = new_store();
    let path = parse_xpath("/system/config/hostname").expect("valid path");
    let err = store.get_update(None, &path).expect_err("nothing stored");
    assert_eq!(err.code(), Code::NotFound);
}
