use super::*;

fn messages(issues: &[ValidationIssue]) -> Vec<String> {
    issues.iter().map(ToString::to_string).collect()
}

#[test]
fn test_pie_with_title_and_entries_is_clean() {
    let result = validate("pie title Pets\n    \"Dogs\" : 386\n    \"Cats\" : 85");
    assert_eq!(result.kind(), Some(DiagramKind::Pie));
    assert!(result.is_valid(), "{:?}", result.errors());
    assert!(result.warnings().is_empty(), "{:?}", result.warnings());
}

#[test]
fn test_pie_non_numeric_value_reports_its_line() {
    let result = validate("pie title Pets\n    \"Dogs\" : abc");
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].line, Some(2));
    assert!(result.errors()[0].message.contains("abc"));
}

#[test]
fn test_pie_negative_value_and_duplicate_label() {
    let result = validate("pie\n    title Mix\n    \"A\" : -1\n    \"A\" : 2");
    assert_eq!(messages(result.errors()).len(), 1);
    assert_eq!(result.errors()[0].line, Some(3));
    assert_eq!(result.warnings().len(), 1);
    assert!(result.warnings()[0].message.contains("duplicate label"));
}

#[test]
fn test_pie_without_entries_is_an_error() {
    let result = validate("pie title Nothing");
    assert!(!result.is_valid());
    assert!(result.errors()[0].message.contains("no data entries"));
}

#[test]
fn test_simple_flowchart_is_clean() {
    let result = validate("flowchart TD\n    A --> B");
    assert_eq!(result.kind(), Some(DiagramKind::Flowchart));
    assert!(result.errors().is_empty());
    assert!(result.warnings().is_empty());
}

#[test]
fn test_unrecognized_keyword_is_single_error() {
    let result = validate("foobar");
    assert!(!result.is_valid());
    assert_eq!(result.kind(), None);
    assert_eq!(result.errors().len(), 1);
    assert!(result.errors()[0].message.contains("unrecognized diagram type"));
    assert!(result.warnings().is_empty());
}

#[test]
fn test_empty_input_is_single_error() {
    for text in ["", "   \n\n", "%% only a comment"] {
        let result = validate(text);
        assert_eq!(result.errors().len(), 1, "{text:?}");
        assert!(result.errors()[0].message.contains("unrecognized diagram type"));
    }
}

#[test]
fn test_keyword_detection_is_case_sensitive() {
    let result = validate("Flowchart TD\n    A --> B");
    assert_eq!(result.kind(), None);
    assert_eq!(result.errors().len(), 1);
}

#[test]
fn test_flowchart_missing_and_invalid_direction() {
    let result = validate("flowchart\n    A --> B");
    assert_eq!(messages(result.errors()), ["Line 1: missing direction (expected TD, TB, BT, LR or RL)"]);

    let result = validate("graph XY\n    A --> B");
    assert_eq!(result.errors().len(), 1);
    assert!(result.errors()[0].message.contains("invalid direction 'XY'"));
}

#[test]
fn test_flowchart_malformed_id_is_a_warning() {
    let result = validate("flowchart TD\n    my-node --> B");
    assert!(result.is_valid());
    assert_eq!(
        messages(result.warnings()),
        ["Line 2: possibly malformed node id 'my-node'"]
    );
}

#[test]
fn test_flowchart_unconnected_declaration_warns() {
    let result = validate("flowchart LR\n    A[Alone]\n    B --> C");
    assert!(result.is_valid());
    assert_eq!(
        messages(result.warnings()),
        ["Line 2: node 'A' is declared but not connected"]
    );
}

#[test]
fn test_flowchart_declared_then_connected_is_clean() {
    let text = "flowchart TD\n    A[Start]\n    B{Ok?}\n    A --> B\n    B -->|Yes| C[Done]\n    style A fill:#f9f\n    classDef hot fill:#f00\n    class B hot";
    let result = validate(text);
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert!(result.warnings().is_empty(), "{:?}", result.warnings());
}

#[test]
fn test_flowchart_unspaced_text_label_is_clean() {
    let result = validate("flowchart LR\n    A-- text -->B\n    B-. maybe .->C");
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert!(result.warnings().is_empty(), "{:?}", result.warnings());
}

#[test]
fn test_line_numbers_count_front_matter_and_comments() {
    let text = "---\ntitle: X\n---\n%% comment\nflowchart TD\n    A -->\n";
    let result = validate(text);
    assert_eq!(messages(result.errors()), ["Line 6: connection is missing a node"]);
}

#[test]
fn test_flowchart_unbalanced_subgraph() {
    let result = validate("flowchart TD\n    subgraph one\n    A --> B");
    assert_eq!(
        messages(result.errors()),
        ["Line 2: subgraph is never closed with 'end'"]
    );

    let result = validate("flowchart TD\n    A --> B\n    end");
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].line, Some(3));
}

#[test]
fn test_flowchart_malformed_declaration_is_an_error() {
    let result = validate("flowchart TD\n    A[broken --> B");
    assert!(!result.is_valid());
    assert!(result.errors()[0].message.contains("malformed node declaration"));
}

#[test]
fn test_sequence_valid_diagram() {
    let text = "sequenceDiagram\n    participant A\n    A->>B: Hello\n    B-->>-A: Hi\n    loop Every minute\n        A-)B: ping\n    end\n    Note right of A: done";
    let result = validate(text);
    assert_eq!(result.kind(), Some(DiagramKind::Sequence));
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert!(result.warnings().is_empty(), "{:?}", result.warnings());
}

#[test]
fn test_sequence_unknown_arrow_is_an_error() {
    let result = validate("sequenceDiagram\n    A->>>B: hi");
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].line, Some(2));
    assert!(result.errors()[0].message.contains("unknown arrow '->>>'"));
}

#[test]
fn test_sequence_arrow_without_dash_is_an_error() {
    let result = validate("sequenceDiagram\n    A => B: hi\n    A ~> B: hi\n    A->>B: ok");
    assert!(!result.is_valid());
    assert_eq!(
        messages(result.errors())
            .iter()
            .map(|m| m.split(" (").next().unwrap_or_default())
            .collect::<Vec<_>>(),
        ["Line 2: unknown arrow '=>'", "Line 3: unknown arrow '~>'"]
    );
    assert!(result.warnings().is_empty(), "{:?}", result.warnings());
}

#[test]
fn test_sequence_message_needs_text_and_target() {
    let result = validate("sequenceDiagram\n    A->>B\n    A->>: hi");
    let errors = messages(result.errors());
    assert_eq!(errors.len(), 2);
    assert!(errors[0].starts_with("Line 2: message from 'A' to 'B'"));
    assert!(errors[1].starts_with("Line 3: message is missing a target"));
}

#[test]
fn test_sequence_unclosed_block() {
    let result = validate("sequenceDiagram\n    alt ok\n    A->>B: yes");
    assert_eq!(
        messages(result.errors()),
        ["Line 2: 'alt' block is never closed with 'end'"]
    );
}

#[test]
fn test_class_unclosed_body() {
    let result = validate("classDiagram\n    class Animal {\n        +int age\n");
    assert_eq!(
        messages(result.errors()),
        ["Line 2: unclosed class body, missing '}'"]
    );
}

#[test]
fn test_class_valid_diagram() {
    let text = "classDiagram\n    Animal <|-- Duck\n    class Duck {\n        +swim()\n    }";
    let result = validate(text);
    assert!(result.is_valid());
    assert!(result.warnings().is_empty());
}

#[test]
fn test_state_diagram_rules() {
    let result = validate("stateDiagram-v2\n    [*] --> Still\n    Still --> [*]");
    assert!(result.is_valid());
    assert!(result.warnings().is_empty());

    let result = validate("stateDiagram\n    Still --> Moving\n    --> Crash");
    assert_eq!(
        messages(result.errors()),
        ["Line 3: transition is missing a state"]
    );
    assert_eq!(result.warnings().len(), 1);
}

#[test]
fn test_er_relationships() {
    let result = validate("erDiagram\n    CUSTOMER ||--o{ ORDER : places\n    ORDER {\n        string id PK\n    }");
    assert!(result.is_valid(), "{:?}", result.errors());

    let result = validate("erDiagram\n    CUSTOMER ||--x ORDER : places");
    assert_eq!(messages(result.errors()), ["Line 2: invalid cardinality '||--x'"]);

    let result = validate("erDiagram\n    CUSTOMER ||--o{ ORDER");
    assert_eq!(
        messages(result.errors()),
        ["Line 2: relationship is missing ': label'"]
    );
}

#[test]
fn test_er_unclosed_entity() {
    let result = validate("erDiagram\n    ORDER {\n        string id");
    assert_eq!(
        messages(result.errors()),
        ["Line 2: unclosed entity block, missing '}'"]
    );
}

#[test]
fn test_gantt_requires_date_format() {
    let text = "gantt\n    title X\n    section A\n    Task one :a1, 2024-01-01, 30d";
    let result = validate(text);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].line, Some(1));
    assert!(result.errors()[0].message.contains("dateFormat"));
}

#[test]
fn test_gantt_task_without_timing() {
    let text = "gantt\n    dateFormat YYYY-MM-DD\n    Task one\n    Task two :";
    let result = validate(text);
    let errors = messages(result.errors());
    assert_eq!(errors.len(), 2);
    assert!(errors[0].starts_with("Line 3:"));
    assert!(errors[1].starts_with("Line 4:"));
}

#[test]
fn test_journey_score_range() {
    let result = validate("journey\n    title Day\n    section Work\n    Code: 7: Me");
    assert_eq!(result.errors().len(), 1);
    assert!(result.errors()[0].message.contains("between 1 and 5"));

    let result = validate("journey\n    title Day\n    section Work\n    Code: 5: Me");
    assert!(result.is_valid());
    assert!(result.warnings().is_empty());
}

#[test]
fn test_quadrant_requires_axes() {
    let result = validate("quadrantChart\n    title T\n    Point A: [0.3, 0.6]");
    let errors = messages(result.errors());
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("x-axis"));
    assert!(errors[1].contains("y-axis"));
}

#[test]
fn test_quadrant_point_out_of_range() {
    let text = "quadrantChart\n    x-axis Low --> High\n    y-axis Low --> High\n    Point A: [1.5, 0.2]";
    let result = validate(text);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].line, Some(4));
}

#[test]
fn test_git_graph_branches() {
    let text = "gitGraph\n    commit\n    branch develop\n    commit\n    checkout main\n    merge develop";
    let result = validate(text);
    assert!(result.is_valid(), "{:?}", result.errors());
    assert!(result.warnings().is_empty());

    let result = validate("gitGraph\n    commit\n    checkout develop");
    assert_eq!(
        messages(result.errors()),
        ["Line 3: cannot checkout unknown branch 'develop'"]
    );

    let result = validate("gitGraph\n    branch dev\n    branch dev\n    fetch");
    let errors = messages(result.errors());
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("already exists"));
    assert!(errors[1].contains("unknown gitGraph command 'fetch'"));
}

#[test]
fn test_mindmap_single_root() {
    let result = validate("mindmap\n  root((A))\n    child\n  other");
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].line, Some(4));

    let result = validate("mindmap");
    assert!(result.errors()[0].message.contains("no root"));
}

#[test]
fn test_report_lists_errors_and_warnings() {
    let report = validate("pie title Pets\n    \"Dogs\" : abc").report();
    assert!(report.starts_with("ERRORS:\n  - Line 2: invalid value 'abc'"));

    let report = validate("flowchart TD\n    A --> B").report();
    assert_eq!(report, "Validation passed\n");
}

#[test]
fn test_kind_parses_names_and_keywords() {
    assert_eq!("sequenceDiagram".parse::<DiagramKind>(), Ok(DiagramKind::Sequence));
    assert_eq!("ER".parse::<DiagramKind>(), Ok(DiagramKind::Er));
    assert_eq!("graph".parse::<DiagramKind>(), Ok(DiagramKind::Flowchart));
    assert!("venn".parse::<DiagramKind>().is_err());
    for kind in DiagramKind::ALL {
        assert_eq!(DiagramKind::from_keyword(kind.keyword()), Some(kind));
    }
}
