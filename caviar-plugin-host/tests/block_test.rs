//! Integration tests for the block lifecycle

mod common;

use std::sync::{Arc, Mutex};

use caviar_plugin_host::{BlockHandle, BlockState, SyncHook};
use common::FooBlock;
use serde_json::{json, Value};

#[tokio::test]
async fn test_foo_block_create_then_run() {
    let mut block = BlockHandle::new(Box::new(FooBlock::new()));
    assert_eq!(block.phases().unwrap(), vec!["default".to_string()]);
    assert_eq!(block.config()["foo"].kind, "bailTop");

    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    block
        .hooks()
        .get::<SyncHook<Value>>("a")
        .unwrap()
        .tap("Test", move |foo| {
            sink.lock().unwrap().push(foo.clone());
            Ok(())
        });

    let created = block.create(&json!({"foo": "foo"})).unwrap();
    assert_eq!(created, &json!({"foo": true}));

    let result = block.run(json!({"foo": "foo"})).await.unwrap();
    assert_eq!(result, json!({"foo": "foo"}));
    assert_eq!(block.state(), BlockState::Ran);
    assert_eq!(*calls.lock().unwrap(), vec![json!("foo")]);
}

#[tokio::test]
#[should_panic(expected = "block: this.created")]
async fn test_foo_block_run_without_create() {
    let mut block = BlockHandle::new(Box::new(FooBlock::new()));
    let _ = block.run(json!({"foo": "foo"})).await;
}

#[tokio::test]
#[should_panic(expected = "block: this.created")]
async fn test_foo_block_created_with_wrong_options() {
    let mut block = BlockHandle::new(Box::new(FooBlock::new()));
    block.create(&json!({"foo": "bar"})).unwrap();
    let _ = block.run(json!({"foo": "foo"})).await;
}

#[test]
fn test_invalid_phases() {
    let block = BlockHandle::new(Box::new(FooBlock::with_phases(json!(1))));
    let err = block.phases().unwrap_err();
    assert_eq!(err.code(), "INVALID_PHASES");
    assert!(err.to_string().contains("FooBlock"));

    let block = BlockHandle::new(Box::new(FooBlock::with_phases(json!(["default", 2]))));
    assert!(block.phases().is_err());
}
