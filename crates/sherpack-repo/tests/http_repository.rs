//! End-to-end coverage of `HttpRepository` against a mocked index server.
//!
//! Mirrors the dependency-resolution scenario from the fixture chart
//! `sub: [0.0.9, 0.1.5, 0.2.0]`: a constraint of `>=0.1.0, <0.2.0` must
//! resolve to `0.1.5`, and an unsatisfiable constraint must name the
//! pack rather than silently falling back to the closest match.

use sherpack_repo::{HttpRepository, RepoError, Repository};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INDEX_YAML: &str = r#"
apiVersion: v1
entries:
  sub:
    - name: sub
      version: 0.0.9
      urls: ["sub-0.0.9.tgz"]
    - name: sub
      version: 0.1.5
      urls: ["sub-0.1.5.tgz"]
    - name: sub
      version: 0.2.0
      urls: ["sub-0.2.0.tgz"]
"#;

#[tokio::test]
async fn resolves_highest_version_within_constraint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INDEX_YAML))
        .mount(&server)
        .await;

    let repo = Repository::new("test", server.uri()).unwrap();
    let mut http = HttpRepository::public(repo).unwrap();

    let resolved = http.find_best_match("sub", ">=0.1.0, <0.2.0").await.unwrap();
    assert_eq!(resolved.version, "0.1.5");
}

#[tokio::test]
async fn unsatisfiable_constraint_names_the_pack() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INDEX_YAML))
        .mount(&server)
        .await;

    let repo = Repository::new("test", server.uri()).unwrap();
    let mut http = HttpRepository::public(repo).unwrap();

    let err = http.find_best_match("sub", ">=9.0").await.unwrap_err();
    match err {
        RepoError::UnsatisfiableConstraint { name, constraint, .. } => {
            assert_eq!(name, "sub");
            assert_eq!(constraint, ">=9.0");
        }
        other => panic!("expected UnsatisfiableConstraint, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_pack_is_reported_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INDEX_YAML))
        .mount(&server)
        .await;

    let repo = Repository::new("test", server.uri()).unwrap();
    let mut http = HttpRepository::public(repo).unwrap();

    let err = http.get_latest("does-not-exist").await.unwrap_err();
    match err {
        RepoError::PackNotFound { name, .. } => assert_eq!(name, "does-not-exist"),
        other => panic!("expected PackNotFound, got {other:?}"),
    }
}
