use std::path::Path;

use foundation_grants::config::RegistryConfig;
use foundation_grants::models::SearchStrategy;
use foundation_grants::registry::{http_client, run_registry_search, search_registry};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(api_root: &str, terms: &Path, output: &Path, extra: &str) -> RegistryConfig {
    let yaml = format!(
        "api_root: {api_root}\n\
         search_string_file: {}\n\
         search_string_col: search_term\n\
         company_col: company\n\
         run_col: run\n\
         ignore_results_with: [Employees]\n\
         output_file: {}\n{extra}",
        terms.display(),
        output.display()
    );
    serde_yaml::from_str(&yaml).unwrap()
}

fn orgs(list: &[(u64, &str)]) -> serde_json::Value {
    let organizations: Vec<_> = list
        .iter()
        .map(|(ein, name)| {
            serde_json::json!({
                "ein": ein,
                "name": name,
                "sub_name": null,
                "city": "IRVING",
                "state": "TX"
            })
        })
        .collect();
    serde_json::json!({
        "total_results": organizations.len(),
        "num_pages": 1,
        "organizations": organizations
    })
}

async fn mock_query(server: &MockServer, q: &str, c_code: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("q", q))
        .and(query_param("c_code[id]", c_code))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_strategies_tagging_and_dedup() {
    let server = MockServer::start().await;
    mock_query(
        &server,
        "\"ExxonMobil\" -Employees",
        "3",
        orgs(&[(136083566, "EXXONMOBIL FOUNDATION"), (751234567, "EXXONMOBIL RETIREES")]),
    )
    .await;
    mock_query(
        &server,
        "\"ExxonMobil\" Foundation -Employees",
        "3",
        orgs(&[(136083566, "EXXONMOBIL FOUNDATION")]),
    )
    .await;
    mock_query(&server, "\"ExxonMobil\" -Employees", "6", orgs(&[(990000001, "EXXON TRADE ASSN")])).await;

    let dir = tempfile::tempdir().unwrap();
    let terms = dir.path().join("terms.csv");
    std::fs::write(
        &terms,
        "company,search_term,run\nExxon Mobil Corp,ExxonMobil,1\nExxon again,ExxonMobil,1\nChevron Corp,Chevron,0\n",
    )
    .unwrap();
    let output = dir.path().join("out.csv");
    let cfg = config(
        &format!("{}/search.json", server.uri()),
        &terms,
        &output,
        "test_just_foundation_first: true\n501c_6: true\n",
    );

    let rows = search_registry(&http_client(5).unwrap(), &cfg).await.unwrap();

    let eins: Vec<_> = rows.iter().map(|r| r.ein.as_str()).collect();
    assert_eq!(eins, vec!["136083566", "751234567", "990000001", ""]);
    assert_eq!(rows[0].c_code, 3);
    assert_eq!(rows[0].full_name, "Exxon Mobil Corp");
    assert_eq!(rows[2].c_code, 6);
    assert_eq!(rows[2].query, SearchStrategy::TradeAssociation);
    assert_eq!(rows[3].search_term, "Chevron");
    assert_eq!(rows[3].propublica_queried, 0);
    assert_eq!(rows[3].c_code, -1);
}

#[tokio::test]
async fn test_failed_query_records_placeholder_and_continues() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("q", "\"Shell\" -Employees"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mock_query(&server, "\"BP\" -Employees", "3", orgs(&[(111111111, "BP FOUNDATION INC")])).await;

    let dir = tempfile::tempdir().unwrap();
    let terms = dir.path().join("terms.csv");
    std::fs::write(&terms, "company,search_term,run\nShell plc,Shell,1\nBP plc,BP,1\n").unwrap();
    let output = dir.path().join("out.csv");
    let cfg = config(&format!("{}/search.json", server.uri()), &terms, &output, "");

    let rows = run_registry_search(&cfg).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].search_term, "Shell");
    assert_eq!(rows[0].ein, "");
    assert_eq!(rows[1].ein, "111111111");

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("search_term,full_name,result_id,ein,name,sub_name,city,state,501c,propublica_queried,query"));
    assert!(written.contains("BP FOUNDATION INC"));
}
