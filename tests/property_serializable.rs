use chrono::{DateTime, Utc};
use crewai_studio::domain::models::{
    Agent, Crew, CrewResult, EntityRecord, KnowledgeSource, Process, Serializable, SourceType, Task, Tool,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000, 0u32..1_000_000_000)
        .prop_map(|(secs, nanos)| DateTime::from_timestamp(secs, nanos).unwrap_or_default())
}

fn ids(max: usize) -> impl Strategy<Value = Vec<Uuid>> {
    prop::collection::vec(any::<u128>().prop_map(Uuid::from_u128), 0..max)
}

fn param_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::from),
    ]
}

fn tool() -> impl Strategy<Value = Tool> {
    (
        "[A-Za-z]{1,16}",
        ".{0,40}",
        prop::collection::btree_map("[a-z_]{1,8}", param_value(), 0..4),
        timestamp(),
    )
        .prop_map(|(name, description, parameters, created_at)| {
            let mut tool = Tool::new(name).with_description(description);
            tool.parameters = parameters;
            tool.created_at = created_at;
            tool
        })
}

fn agent() -> impl Strategy<Value = Agent> {
    (
        "[a-z ]{1,20}",
        ".{0,40}",
        0u32..=200,
        1u32..50,
        any::<(bool, bool, bool)>(),
        ids(4),
        ids(3),
        timestamp(),
    )
        .prop_map(|(role, goal, temp, max_iter, flags, tool_ids, source_ids, created_at)| {
            let mut agent = Agent::new(role).with_goal(goal);
            agent.temperature = f64::from(temp) / 100.0;
            agent.max_iter = max_iter;
            (agent.allow_delegation, agent.verbose, agent.cache) = flags;
            agent.tool_ids = tool_ids;
            agent.knowledge_source_ids = source_ids;
            agent.created_at = created_at;
            agent
        })
}

fn task() -> impl Strategy<Value = Task> {
    (
        ".{1,40}",
        ".{0,40}",
        any::<bool>(),
        prop::option::of(any::<u128>().prop_map(Uuid::from_u128)),
        ids(3),
        ids(3),
        timestamp(),
    )
        .prop_map(|(description, expected, async_execution, agent_id, ctx_async, ctx_sync, created_at)| {
            let mut task = Task::new(description, expected);
            task.async_execution = async_execution;
            task.agent_id = agent_id;
            task.context_from_async_tasks_ids = ctx_async;
            task.context_from_sync_tasks_ids = ctx_sync;
            task.created_at = created_at;
            task
        })
}

fn crew() -> impl Strategy<Value = Crew> {
    (
        "[a-z-]{1,16}",
        any::<bool>(),
        ids(4),
        ids(4),
        prop::option::of(0u32..1000),
        prop::option::of("[a-z-]{1,10}"),
        timestamp(),
    )
        .prop_map(|(name, hierarchical, agent_ids, task_ids, max_rpm, manager_llm, created_at)| {
            let mut crew = Crew::new(name);
            if hierarchical {
                crew.process = Process::Hierarchical;
            }
            crew.agent_ids = agent_ids;
            crew.task_ids = task_ids;
            crew.max_rpm = max_rpm;
            crew.manager_llm = manager_llm;
            crew.created_at = created_at;
            crew
        })
}

proptest! {
    /// Property: a tool survives conversion to its record and back
    #[test]
    fn prop_tool_roundtrip(tool in tool()) {
        prop_assert_eq!(Tool::from_record(tool.to_record()).unwrap(), tool);
    }

    #[test]
    fn prop_agent_roundtrip(agent in agent()) {
        prop_assert_eq!(Agent::from_record(agent.to_record()).unwrap(), agent);
    }

    /// Property: task context order is kept exactly
    #[test]
    fn prop_task_roundtrip(task in task()) {
        prop_assert_eq!(Task::from_record(task.to_record()).unwrap(), task);
    }

    #[test]
    fn prop_crew_roundtrip(crew in crew()) {
        prop_assert_eq!(Crew::from_record(crew.to_record()).unwrap(), crew);
    }

    /// Property: the export envelope keeps the record intact
    #[test]
    fn prop_export_envelope_roundtrip(agent in agent()) {
        let record = EntityRecord::Agent(agent.to_record());
        let text = serde_json::to_string(&record).unwrap();
        let back: EntityRecord = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(back, record);
    }

    #[test]
    fn prop_result_roundtrip(raw in ".{0,60}", created_at in timestamp()) {
        let mut result = CrewResult::new(Uuid::new_v4(), "crew", json!({ "raw": raw })).with_input("topic", "x");
        result.created_at = created_at;
        prop_assert_eq!(CrewResult::from_record(result.to_record()).unwrap(), result);
    }
}

#[test]
fn test_knowledge_source_roundtrip_keeps_metadata() {
    let mut source = KnowledgeSource::new("reports", SourceType::Csv).with_path("data/reports.csv");
    source.metadata.insert("owner".to_string(), json!("finance"));
    source.metadata.insert("rows".to_string(), json!(1200));
    assert_eq!(KnowledgeSource::from_record(source.to_record()).unwrap(), source);
}

#[test]
fn test_malformed_id_is_rejected() {
    let mut record = Tool::new("search").to_record();
    record.id = "not-a-uuid".to_string();
    assert!(Tool::from_record(record).is_err());
}
