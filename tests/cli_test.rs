use assert_cmd::cargo::cargo_bin_cmd;
use httpmock::prelude::*;
use predicates::prelude::PredicateBooleanExt;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_credentials(dir: &Path, host: &str, output_format: &str) {
    fs::write(
        dir.join("credentials.json"),
        json!({
            "host": host,
            "access_token": "test-token",
            "output_format": output_format,
        })
        .to_string(),
    )
    .unwrap();
}

fn recent_date(days_ago: i64) -> String {
    (chrono::Utc::now() - chrono::Duration::days(days_ago))
        .format("%Y-%m-%dT%H:%M:%S%.6f%:z")
        .to_string()
}

#[test]
fn help_lists_the_command_groups() {
    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("node"))
        .stdout(predicates::str::contains("port"))
        .stdout(predicates::str::contains("interface"))
        .stdout(predicates::str::contains("config"));
}

#[test]
fn bare_ls_prints_a_usage_hint() {
    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.args(["node", "ls"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("meshctl node ls --all"));
}

#[test]
fn ambiguous_filter_combinations_are_rejected() {
    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.args(["node", "ls", "--all", "--state", "active"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("ambiguous"));
}

#[test]
fn search_needs_exactly_one_of_name_and_id() {
    let mut bare = cargo_bin_cmd!("meshctl");
    bare.args(["node", "search"]);
    bare.assert().failure();

    let mut both = cargo_bin_cmd!("meshctl");
    both.args(["node", "search", "--name", "alpha", "--id", "n1"]);
    both.assert().failure();
}

#[test]
fn missing_credentials_point_to_config() {
    let dir = tempdir().unwrap();
    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.env("MESHCTL_CONFIG_DIR", dir.path());
    cmd.args(["node", "total"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("meshctl config"));
}

#[test]
fn ls_all_renders_a_node_table() {
    let server = MockServer::start();
    let nodes = server.mock(|when, then| {
        when.method(GET)
            .path("/nodes")
            .header("Authorization", "Bearer test-token")
            .header("Accept", "application/json");
        then.status(200).json_body(json!([
            {"id": "n1", "name": "alpha", "node_state": "active", "date_created": recent_date(3)},
            {"id": "n2", "name": "beta", "node_state": "stopped", "date_created": recent_date(12)},
        ]));
    });
    let dir = tempdir().unwrap();
    write_credentials(dir.path(), &server.base_url(), "default");

    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.env("MESHCTL_CONFIG_DIR", dir.path());
    cmd.args(["node", "ls", "--all"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Age (days)"))
        .stdout(predicates::str::contains("alpha"))
        .stdout(predicates::str::contains("beta"));
    nodes.assert();
}

#[test]
fn state_and_age_sends_both_clauses() {
    let server = MockServer::start();
    let nodes = server.mock(|when, then| {
        when.method(GET)
            .path("/nodes")
            .query_param("select", "*")
            .query_param("node_state", "eq.active")
            .query_param_exists("date_created");
        then.status(200).json_body(json!([]));
    });
    let dir = tempdir().unwrap();
    write_credentials(dir.path(), &server.base_url(), "default");

    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.env("MESHCTL_CONFIG_DIR", dir.path());
    cmd.args(["node", "ls", "--state", "active", "--age", "7"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("returned no results"));
    nodes.assert();
}

#[test]
fn empty_result_prints_no_results_not_a_table() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/ports");
        then.status(200).json_body(json!([]));
    });
    let dir = tempdir().unwrap();
    write_credentials(dir.path(), &server.base_url(), "default");

    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.env("MESHCTL_CONFIG_DIR", dir.path());
    cmd.args(["port", "ls", "--all"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Your query returned no results"))
        .stdout(predicates::str::contains("Associated node").not());
}

#[test]
fn json_flag_overrides_stored_preference() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/nodes");
        then.status(200).json_body(json!([
            {"id": "n1", "name": "alpha", "node_state": "active", "date_created": recent_date(1)},
        ]));
    });
    let dir = tempdir().unwrap();
    write_credentials(dir.path(), &server.base_url(), "default");

    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.env("MESHCTL_CONFIG_DIR", dir.path());
    cmd.args(["node", "ls", "--all", "--json"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("\"node_state\""))
        .stdout(predicates::str::contains("Age (days)").not());
}

#[test]
fn stored_json_preference_applies_without_flag() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/nodes");
        then.status(200).json_body(json!([
            {"id": "n1", "name": "alpha", "node_state": "active", "date_created": recent_date(1)},
        ]));
    });
    let dir = tempdir().unwrap();
    write_credentials(dir.path(), &server.base_url(), "json");

    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.env("MESHCTL_CONFIG_DIR", dir.path());
    cmd.args(["node", "ls", "--all"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("\"date_created\""));
}

#[test]
fn total_prints_a_single_count_line() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/interfaces");
        then.status(200).json_body(json!([
            {"id": "i1"}, {"id": "i2"}, {"id": "i3"},
        ]));
    });
    let dir = tempdir().unwrap();
    write_credentials(dir.path(), &server.base_url(), "default");

    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.env("MESHCTL_CONFIG_DIR", dir.path());
    cmd.args(["interface", "total"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("There are 3 interfaces in your mesh."));
}

#[test]
fn descendants_tree_dedups_related_names() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/ancestor_nodes")
            .query_param("root_node_id", "eq.n1");
        then.status(200).json_body(json!([
            {"descendant_node_name": "treatment", "descendant_node_category": "enrich", "descendant_node_id": "d1"},
            {"descendant_node_name": "treatment", "descendant_node_category": "enrich", "descendant_node_id": "d2"},
            {"descendant_node_name": "reservoir", "descendant_node_category": "source", "descendant_node_id": "d3"},
        ]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/nodes").query_param("id", "eq.n1");
        then.status(200)
            .json_body(json!([{"id": "n1", "name": "root"}]));
    });
    let dir = tempdir().unwrap();
    write_credentials(dir.path(), &server.base_url(), "default");

    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.env("MESHCTL_CONFIG_DIR", dir.path());
    cmd.args(["node", "descendants", "n1", "--tree"]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("DESCENDANT TREE: ROOT"))
        .stdout(predicates::str::contains("treatment").count(1))
        .stdout(predicates::str::contains("reservoir").count(1));
}

#[test]
fn expired_token_reports_remediation() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/nodes");
        then.status(401).json_body(json!({"message": "JWT expired"}));
    });
    let dir = tempdir().unwrap();
    write_credentials(dir.path(), &server.base_url(), "default");

    let mut cmd = cargo_bin_cmd!("meshctl");
    cmd.env("MESHCTL_CONFIG_DIR", dir.path());
    cmd.args(["node", "ls", "--all"]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("access token has expired"));
}
