use log::info;
use rocket::{serde::json::Json, Route, State};

use crate::{
    api::session::AdminSession,
    error::Result,
    model::{
        election::{
            CandidateSummary, ElectionDetail, ElectionSpec, ElectionSummary, VoteReceipt,
            VoteRequest,
        },
        mongodb::Id,
    },
    repository::Repositories,
};

pub fn routes() -> Vec<Route> {
    routes![elections, election, create_election, vote]
}

/// All elections. Always succeeds: a store failure shows up as an empty list.
#[get("/elections")]
pub async fn elections(repositories: &State<Repositories>) -> Json<Vec<ElectionSummary>> {
    Json(repositories.elections().list_elections().await)
}

#[get("/elections/<event_id>")]
pub async fn election(
    event_id: Id,
    repositories: &State<Repositories>,
) -> Result<Json<ElectionDetail>> {
    let detail = repositories.elections().get_election(event_id).await?;
    Ok(Json(detail))
}

#[post("/elections", data = "<spec>", format = "json")]
pub async fn create_election(
    session: AdminSession,
    spec: Json<ElectionSpec>,
    repositories: &State<Repositories>,
) -> Result<Json<ElectionSummary>> {
    let ElectionSpec { name, candidates } = spec.into_inner();
    let event = repositories
        .elections()
        .create_election(&name, candidates.clone())
        .await?;
    info!("{} created election {}", session.0.full_name, event.id);

    Ok(Json(ElectionSummary {
        id: event.id.into(),
        name: event.event.name,
        created_at: event.event.created_at,
        candidates: candidates
            .into_iter()
            .zip(1..)
            .map(|(name, ballot_index)| CandidateSummary { name, ballot_index })
            .collect(),
    }))
}

#[post("/elections/<event_id>/vote", data = "<ballot>", format = "json")]
pub async fn vote(
    event_id: Id,
    ballot: Json<VoteRequest>,
    repositories: &State<Repositories>,
) -> Result<Json<VoteReceipt>> {
    let candidate = repositories
        .elections()
        .cast_vote(event_id, ballot.ballot_index)
        .await?;
    Ok(Json(candidate.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::repository::{EventRepository, MemoryStore};

    use super::*;

    async fn create(client: &Client, spec: ElectionSpec) -> ElectionSummary {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    #[backend_test(admin)]
    async fn create_then_view(client: Client, store: MemoryStore) {
        let created = create(&client, ElectionSpec::example()).await;
        assert_eq!(created.name, "Mesa 1");
        assert_eq!(created.candidates.len(), 2);

        let event_id: Id = created.id.parse().unwrap();
        let stored = store.find_by_id_with_candidates(event_id).await.unwrap();
        assert_eq!(stored.candidates.len(), 2);

        let response = client.get(uri!(election(event_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let detail = response.into_json::<ElectionDetail>().await.unwrap();
        assert_eq!(detail.name, "Mesa 1");
        assert_eq!(detail.status, "En Curso");
        assert_eq!(
            detail
                .candidates
                .iter()
                .map(|c| (c.ballot_index, c.name.as_str(), c.vote_count))
                .collect::<Vec<_>>(),
            vec![(1, "Ana", 0), (2, "Luis", 0)]
        );
    }

    #[backend_test]
    async fn create_requires_admin(client: Client, store: MemoryStore) {
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(json!(ElectionSpec::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert!(store.events().is_empty());
    }

    #[backend_test(admin)]
    async fn list_shows_every_election(client: Client) {
        create(&client, ElectionSpec::example()).await;
        create(
            &client,
            ElectionSpec {
                name: "Mesa 2".to_string(),
                candidates: vec![],
            },
        )
        .await;

        let response = client.get(uri!(elections)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let list = response
            .into_json::<Vec<ElectionSummary>>()
            .await
            .unwrap();
        assert_eq!(
            list.iter()
                .map(|e| (e.name.as_str(), e.candidates.len()))
                .collect::<Vec<_>>(),
            vec![("Mesa 1", 2), ("Mesa 2", 0)]
        );
    }

    #[backend_test]
    async fn list_is_empty_when_store_fails(client: Client, store: MemoryStore) {
        store.create("Mesa 1").await.unwrap();
        store.fail_reads(true);

        let response = client.get(uri!(elections)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let list = response
            .into_json::<Vec<ElectionSummary>>()
            .await
            .unwrap();
        assert!(list.is_empty());
    }

    #[backend_test]
    async fn unknown_election_is_not_found(client: Client) {
        let response = client.get(uri!(election(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn view_failure_is_server_error(client: Client, store: MemoryStore) {
        let event = store.create("Mesa 1").await.unwrap();
        store.fail_reads(true);

        let response = client.get(uri!(election(event.id))).dispatch().await;
        assert_eq!(Status::InternalServerError, response.status());
    }

    #[backend_test(admin)]
    async fn votes_are_counted(client: Client) {
        let created = create(&client, ElectionSpec::example()).await;
        let event_id: Id = created.id.parse().unwrap();

        for _ in 0..2 {
            let response = client
                .post(uri!(vote(event_id)))
                .header(ContentType::JSON)
                .body(json!({ "ballot_index": 1 }).to_string())
                .dispatch()
                .await;
            assert_eq!(Status::Ok, response.status());
            let receipt = response.into_json::<VoteReceipt>().await.unwrap();
            assert_eq!(receipt.candidate, "Ana");
        }

        let detail = client
            .get(uri!(election(event_id)))
            .dispatch()
            .await
            .into_json::<ElectionDetail>()
            .await
            .unwrap();
        assert_eq!(detail.candidates[0].vote_count, 2);
        assert_eq!(detail.candidates[1].vote_count, 0);
    }

    #[backend_test]
    async fn vote_for_unknown_candidate_is_not_found(client: Client, store: MemoryStore) {
        let event = store.create("Mesa 1").await.unwrap();

        let response = client
            .post(uri!(vote(event.id)))
            .header(ContentType::JSON)
            .body(json!({ "ballot_index": 1 }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
