use batchflow_ir::Error;
use batchflow_ir::batch::{Batch, Jobflow};
use batchflow_ir::graph::{CoreOperatorKind, OperatorBody, OperatorGraph};
use batchflow_ir::inspect::{
    InspectOptions, InspectionNode, Inspector, PORT_DOWNSTREAM, PORT_UPSTREAM, PortReference,
};
use batchflow_ir::plan::{Plan, SubPlan, SubPlanInputRef, SubPlanOutputRef};

use pretty_assertions::assert_eq;

fn jobflow(id: &str) -> Jobflow {
    let mut graph = OperatorGraph::new();
    let (_, out) = graph.add_external_input("in", "Model", None).unwrap();
    let (_, input) = graph.add_external_output("out", "Model", None).unwrap();
    graph.connect(out, input).unwrap();
    Jobflow::new(id, format!("com.example.{id}"), graph)
}

fn upstream(node: &InspectionNode, id: &str) -> Vec<PortReference> {
    node.element(id).unwrap().input(PORT_UPSTREAM).unwrap().opposites.clone()
}

fn downstream(node: &InspectionNode, id: &str) -> Vec<PortReference> {
    node.element(id).unwrap().output(PORT_DOWNSTREAM).unwrap().opposites.clone()
}

#[test]
fn batch_reproduces_blocker_relation() {
    let mut batch = Batch::new("daily");
    let first = batch.add_element(jobflow("first")).unwrap();
    let second = batch.add_element(jobflow("second")).unwrap();
    let last = batch.add_element(jobflow("last")).unwrap();
    batch.add_blocker(second, first).unwrap();
    batch.add_blocker(last, first).unwrap();
    batch.add_blocker(last, second).unwrap();

    let node = Inspector::default().inspect_batch(&batch).unwrap();
    assert_eq!(node.title, "Batch");
    assert_eq!(node.elements.len(), 3);

    assert_eq!(upstream(&node, "first"), Vec::<PortReference>::new());
    assert_eq!(
        downstream(&node, "first"),
        vec![
            PortReference::new("second", PORT_UPSTREAM),
            PortReference::new("last", PORT_UPSTREAM),
        ]
    );
    assert_eq!(
        upstream(&node, "last"),
        vec![
            PortReference::new("first", PORT_DOWNSTREAM),
            PortReference::new("second", PORT_DOWNSTREAM),
        ]
    );
    assert_eq!(downstream(&node, "last"), Vec::<PortReference>::new());

    // Operators are rendered inside each jobflow with their own counters.
    let first = node.element("first").unwrap();
    assert_eq!(first.title, "Jobflow");
    assert_eq!(first.properties["class"], "com.example.first");
    assert_eq!(
        first.element("output-out").unwrap().input("in0").unwrap().opposites,
        vec![PortReference::new("input-in", "out0")]
    );
}

#[test]
fn empty_batch_renders_without_elements() {
    let node = Inspector::default().inspect_batch(&Batch::new("empty")).unwrap();
    assert_eq!(node, InspectionNode::new("empty", "Batch"));
}

#[test]
fn cyclic_blockers_are_rejected_unless_trusted() {
    let mut batch = Batch::new("loop");
    let a = batch.add_element(jobflow("a")).unwrap();
    let b = batch.add_element(jobflow("b")).unwrap();
    batch.add_blocker(a, b).unwrap();
    batch.add_blocker(b, a).unwrap();

    let err = Inspector::default().inspect_batch(&batch).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency(_)));

    let node = Inspector::new(InspectOptions::trusting())
        .inspect_batch(&batch)
        .unwrap();
    assert_eq!(downstream(&node, "a"), vec![PortReference::new("b", PORT_UPSTREAM)]);
    assert_eq!(downstream(&node, "b"), vec![PortReference::new("a", PORT_UPSTREAM)]);
}

#[test]
fn three_jobflow_cycle_terminates_when_trusted() {
    // a blocks b, b blocks c, c blocks a
    let mut batch = Batch::new("ring");
    let a = batch.add_element(jobflow("a")).unwrap();
    let b = batch.add_element(jobflow("b")).unwrap();
    let c = batch.add_element(jobflow("c")).unwrap();
    batch.add_blocker(b, a).unwrap();
    batch.add_blocker(c, b).unwrap();
    batch.add_blocker(a, c).unwrap();

    let err = Inspector::default().inspect_batch(&batch).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency(_)));
    assert!(matches!(batch.execution_order(), Err(Error::CyclicDependency(_))));

    let node = Inspector::new(InspectOptions::trusting())
        .inspect_batch(&batch)
        .unwrap();
    assert_eq!(node.elements.len(), 3);
    assert_eq!(downstream(&node, "a"), vec![PortReference::new("b", PORT_UPSTREAM)]);
    assert_eq!(downstream(&node, "b"), vec![PortReference::new("c", PORT_UPSTREAM)]);
    assert_eq!(downstream(&node, "c"), vec![PortReference::new("a", PORT_UPSTREAM)]);
    assert_eq!(upstream(&node, "a"), vec![PortReference::new("c", PORT_DOWNSTREAM)]);
    node.verify_symmetry().unwrap();
}

/// One checkpoint operator fronted by an input and an output.
fn stage(role: &str) -> SubPlan {
    let mut graph = OperatorGraph::new();
    let op = graph.add_operator(OperatorBody::Core(CoreOperatorKind::Checkpoint));
    let mut sub = SubPlan::new(graph);
    sub.attributes.insert("role".into(), role.into());
    let input = sub.add_input(op).unwrap();
    sub.input_mut(input)
        .unwrap()
        .attributes
        .insert("exchange".into(), "broadcast".into());
    sub.add_output(op).unwrap();
    sub
}

#[test]
fn plan_links_sub_plans_both_ways() {
    let mut plan = Plan::new();
    plan.attributes.insert("name".into(), "main".into());
    let produce = plan.add_sub_plan(stage("produce"));
    let consume = plan.add_sub_plan(stage("consume"));
    plan.connect(
        SubPlanOutputRef { sub_plan: produce, index: 0 },
        SubPlanInputRef { sub_plan: consume, index: 0 },
    )
    .unwrap();

    let node = Inspector::default().inspect_plan("p", &plan).unwrap();
    assert_eq!(node.title, "Plan");
    assert_eq!(node.properties["name"], "main");
    assert_eq!(node.elements.len(), plan.len());

    let sub0 = node.element("sub-0").unwrap();
    let sub1 = node.element("sub-1").unwrap();
    assert_eq!(sub0.properties["role"], "produce");
    assert_eq!(
        sub0.output("core-0").unwrap().opposites,
        vec![PortReference::new("sub-1", "core-0")]
    );
    assert_eq!(
        sub1.input("core-0").unwrap().opposites,
        vec![PortReference::new("sub-0", "core-0")]
    );
    assert_eq!(sub0.input("core-0").unwrap().opposites, Vec::<PortReference>::new());
    assert_eq!(sub1.output("core-0").unwrap().opposites, Vec::<PortReference>::new());

    assert_eq!(sub1.input("core-0").unwrap().properties["exchange"], "broadcast");
    assert_eq!(sub1.elements.len(), 1);
    assert_eq!(sub1.elements[0].title, "Checkpoint");
}

#[test]
fn cyclic_plan_is_left_to_the_planner() {
    let mut plan = Plan::new();
    let a = plan.add_sub_plan(stage("a"));
    let b = plan.add_sub_plan(stage("b"));
    plan.connect(
        SubPlanOutputRef { sub_plan: a, index: 0 },
        SubPlanInputRef { sub_plan: b, index: 0 },
    )
    .unwrap();
    plan.connect(
        SubPlanOutputRef { sub_plan: b, index: 0 },
        SubPlanInputRef { sub_plan: a, index: 0 },
    )
    .unwrap();

    assert!(matches!(plan.validate(), Err(Error::CyclicDependency(_))));

    for inspector in [Inspector::default(), Inspector::new(InspectOptions::trusting())] {
        let node = inspector.inspect_plan("p", &plan).unwrap();
        node.verify_symmetry().unwrap();
        assert_eq!(node.elements.len(), 2);
        assert_eq!(
            node.element("sub-0").unwrap().input("core-0").unwrap().opposites,
            vec![PortReference::new("sub-1", "core-0")]
        );
    }
}
