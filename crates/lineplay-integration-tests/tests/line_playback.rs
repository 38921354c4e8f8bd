//! Integration test: Feed To Sink
//!
//! Reads a recorded feed through the `FeedReader`, replays it against the
//! full line registry and checks what the basic and TMC topologies publish
//! to a `MemorySink`. Queue contents and station accruals are checked on the
//! registry itself after the run.

use std::io::Cursor;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use lineplay_core::entity::EntityKind;
use lineplay_core::record::StateCode;
use lineplay_core::registry::EntityRegistry;
use lineplay_core::replay::{ReplayConfig, ReplaySummary, TimelineReplayer};
use lineplay_core::time::SimTime;
use lineplay_data::feed::FeedReader;
use lineplay_model::line::{self, OVEN_BATCH_SIZE};
use lineplay_model::{FixedClock, MemorySink, Topology, Value};

const HEADER: &str =
    "Timestamp,Object,Event_Name,Event_Value,Serial_Num,Type_ID,Reworked,OvenBatch";

/// Two parts entering the line; the first one moves on to Insulating.
const JOURNEY: &str = "\
0,Cleaning,State,0,,,,
0,Queue for Cleaning,Work_In,,A1,2,,
0,Queue for Cleaning,Work_In,,A2,4,,
1,Queue for Cleaning,Work_Out,,A1,2,,
1,Cleaning,Work_In,,A1,2,,
1,Cleaning,State,1,,,,
3,Cleaning,State,3,,,,
5,Cleaning,State,1,,,,
8,Cleaning,Work_Out,,A1,2,Y,
8,Cleaning,State,2,,,,
8,Queue for Insulating,Work_In,,A1,2,,
";

async fn setup(topology: Topology) -> (EntityRegistry, Arc<MemorySink>) {
    let mut sink = MemorySink::new();
    topology.declare(&mut sink);
    let sink = Arc::new(sink);
    let mut registry = line::build_registry().unwrap();
    let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap()));
    topology.install(&mut registry, sink.clone(), clock).await.unwrap();
    (registry, sink)
}

async fn play(body: &str, registry: &mut EntityRegistry, config: ReplayConfig) -> ReplaySummary {
    let feed = FeedReader::new(Cursor::new(format!("{HEADER}\n{body}"))).unwrap();
    TimelineReplayer::new(config)
        .unwrap()
        .run(feed, registry)
        .await
        .unwrap()
}

fn oven_body(parts: usize, batch: u32) -> String {
    let mut body = String::from("0,Oven,State,1,,,,\n");
    for i in 1..=parts {
        body.push_str(&format!("{i},Oven,Work_Out,,OV{i},3,,{batch}\n"));
    }
    body
}

#[tokio::test]
async fn basic_model_follows_part_journey() {
    let (mut reg, sink) = setup(Topology::Basic).await;

    let summary = play(JOURNEY, &mut reg, ReplayConfig::default()).await;
    assert_eq!(summary.groups_dispatched, 5);
    assert_eq!(summary.records_ignored, 0);

    // A2 is still waiting; A1 moved on.
    let cleaning_q = reg.queue("Queue for Cleaning").unwrap();
    assert_eq!(cleaning_q.len(), 1);
    assert_eq!(cleaning_q.parts()[0].serial_num.as_deref(), Some("A2"));
    assert_eq!(reg.queue("Queue for Insulating").unwrap().len(), 1);

    let cleaning = reg.activity("Cleaning").unwrap();
    assert_eq!(cleaning.state(), StateCode::BLOCKED);
    assert_eq!(cleaning.process_time(), SimTime::ZERO);
    assert_eq!(cleaning.last_part_out(), SimTime::from_num(8));

    // Working 1..3 and 5..8, with a changeover in between.
    let node = |leaf: &str| format!("AssemblyLine/Cleaning/OutputPoint/{leaf}");
    assert_eq!(
        sink.value(&node("ProducedMaterial/Properties/ProcessTime")).await,
        Some(Value::Double(5.0))
    );
    assert_eq!(
        sink.value(&node("ProducedMaterial/Properties/PartToPartTime")).await,
        Some(Value::Double(8.0))
    );
    assert_eq!(
        sink.value(&node("ProducedMaterial/Properties/Reworked")).await,
        Some(Value::Bool(true))
    );
    assert_eq!(
        sink.value(&node("ProducedMaterial/LotID")).await,
        Some(Value::Text("20240315-DWC16JP-A1".to_string()))
    );
    assert_eq!(
        sink.value(&node("ProducedMaterialMasterTotal")).await,
        Some(Value::Double(1.0))
    );
    assert_eq!(
        sink.value(&node("DownstreamHeld")).await,
        Some(Value::Bool(true))
    );
}

#[tokio::test]
async fn tmc_model_publishes_sublot_per_part() {
    let (mut reg, sink) = setup(Topology::Tmc).await;

    play(JOURNEY, &mut reg, ReplayConfig::default()).await;

    let base = "AssemblyLine/Cleaning/MaterialOutputPoints/MaterialOutput";
    let produced = sink.value(&format!("{base}/ProducedMaterial")).await.unwrap();
    let sublot = produced.as_sublot().unwrap();
    assert_eq!(sublot.id, "20240315-DWC16JP-A1");
    assert_eq!(sublot.quantity, 1.0);
    assert!(sublot.sublots.is_empty());
    let props = &sublot.material_lot.properties;
    assert_eq!(props[0].value, Some(Value::Double(5.0)));
    assert_eq!(props[2].value, Some(Value::Bool(true)));
    // No oven batch on a cleaning part.
    assert_eq!(props[3].value, None);
    assert_eq!(
        sink.value(&format!("{base}/ProducedMaterialMasterTotal")).await,
        Some(Value::Double(1.0))
    );
}

#[tokio::test]
async fn tmc_oven_publishes_each_full_batch() {
    let (mut reg, sink) = setup(Topology::Tmc).await;

    play(&oven_body(OVEN_BATCH_SIZE * 2 + 5, 7), &mut reg, ReplayConfig::default()).await;

    let base = "AssemblyLine/Oven/MaterialOutputPoints/MaterialOutput";
    // Two complete batches; the five leftover parts are held back.
    assert_eq!(
        sink.value(&format!("{base}/ProducedMaterialMasterTotal")).await,
        Some(Value::Double(40.0))
    );
    let produced = sink.value(&format!("{base}/ProducedMaterial")).await.unwrap();
    let batch = produced.as_sublot().unwrap();
    assert_eq!(batch.id, "20240315-ovenbatch-7");
    assert_eq!(batch.sublots.len(), OVEN_BATCH_SIZE);
    assert_eq!(batch.sublots[0].id, "20240315-SJC19CK-OV21");
    assert_eq!(batch.sublots[OVEN_BATCH_SIZE - 1].id, "20240315-SJC19CK-OV40");
}

#[tokio::test]
async fn basic_oven_fills_slots_from_feed() {
    let (mut reg, sink) = setup(Topology::Basic).await;

    play(&oven_body(3, 2), &mut reg, ReplayConfig::default()).await;

    let slot = |n: u32, leaf: &str| {
        format!("AssemblyLine/Oven/OutputPoint/ProducedMaterial/Sublots/Part{n:02}/{leaf}")
    };
    for n in 1..=3 {
        assert_eq!(
            sink.value(&slot(n, "LotID")).await,
            Some(Value::Text(format!("20240315-SJC19CK-OV{n}")))
        );
    }
    assert_eq!(sink.value(&slot(4, "LotID")).await, None);
    assert_eq!(
        sink.value("AssemblyLine/Oven/OutputPoint/ProducedMaterial/LotID").await,
        Some(Value::Text("20240315-ovenbatch-2".to_string()))
    );
}

#[tokio::test]
async fn auto_register_creates_missing_entities() {
    let (mut reg, sink) = setup(Topology::Basic).await;
    let before = reg.len();
    let body = "\
0,Queue for Paint,Work_In,,P1,1,,
2,Queue for Paint,Work_Out,,P1,1,,
2,Paint,Work_In,,P1,1,,
2,Paint,State,1,,,,
";
    let config = ReplayConfig {
        auto_register: true,
        ..ReplayConfig::default()
    };

    let summary = play(body, &mut reg, config).await;

    assert_eq!(summary.entities_registered, 2);
    assert_eq!(reg.len(), before + 2);
    assert_eq!(reg.get("Queue for Paint").unwrap().kind(), EntityKind::Queue);
    assert_eq!(reg.get("Paint").unwrap().kind(), EntityKind::Activity);
    assert_eq!(reg.activity("Paint").unwrap().state(), StateCode::WORKING);
    // New entities have no observers, so nothing is published for them.
    assert!(sink.snapshot().await.iter().all(|(path, _)| !path.contains("Paint")));
}

#[tokio::test]
async fn unknown_objects_skipped_without_auto_register() {
    let (mut reg, _sink) = setup(Topology::Basic).await;
    let before = reg.len();
    let body = "\
0,Paint,State,1,,,,
1,Cleaning,State,1,,,,
";

    let summary = play(body, &mut reg, ReplayConfig::default()).await;

    assert_eq!(summary.records_ignored, 1);
    assert_eq!(summary.entities_registered, 0);
    assert_eq!(reg.len(), before);
    assert!(!reg.contains("Paint"));
}
