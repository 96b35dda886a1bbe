//! Blocking OData Web API client.
//!
//! Maps [`RegistrationApi`] onto the platform's registration tables:
//!
//! | Record | Entity set |
//! |---|---|
//! | assembly | `pluginassemblies` |
//! | plugin type | `plugintypes` |
//! | step | `sdkmessageprocessingsteps` |
//! | image | `sdkmessageprocessingstepimages` |
//! | message / filter | `sdkmessages` / `sdkmessagefilters` |
//!
//! The client never authenticates; it is handed a bearer token.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use stepsync_core::{Coded, ImageType, Mode, RemoteId, Stage};

use crate::api::{
    AssemblyRef, FilterRef, ImageRef, ImageUpdate, NewImage, NewStep, PluginTypeRef,
    RegistrationApi, StepRef, StepUpdate,
};
use crate::error::ApiError;

const SOLUTION_HEADER: &str = "MSCRM.SolutionUniqueName";
const ENTITY_ID_HEADER: &str = "OData-EntityId";
/// `primaryobjecttypecode` / `secondaryobjecttypecode` value meaning "no entity".
const NO_ENTITY: &str = "none";

/// Connection settings for [`WebApiClient`].
#[derive(Debug, Clone)]
pub struct WebApiConfig {
    /// Environment root, e.g. `https://contoso.crm.dynamics.com`.
    pub environment_url: String,
    pub api_version: String,
    pub token: String,
    pub timeout: Duration,
}

pub struct WebApiClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssemblyRow {
    pluginassemblyid: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct PluginTypeRow {
    plugintypeid: String,
    typename: String,
}

#[derive(Debug, Deserialize)]
struct StepRow {
    sdkmessageprocessingstepid: String,
    #[serde(rename = "_eventhandler_value")]
    eventhandler: String,
    stage: i32,
    mode: i32,
    rank: u32,
    filteringattributes: Option<String>,
    configuration: Option<String>,
    sdkmessageid: Option<MessageRow>,
    sdkmessagefilterid: Option<FilterRow>,
}

#[derive(Debug, Deserialize)]
struct MessageRow {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FilterRow {
    primaryobjecttypecode: Option<String>,
    secondaryobjecttypecode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageRow {
    sdkmessageprocessingstepimageid: String,
    #[serde(rename = "_sdkmessageprocessingstepid_value")]
    step_id: String,
    name: String,
    imagetype: i32,
    entityalias: Option<String>,
    attributes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[serde(alias = "sdkmessageid", alias = "sdkmessagefilterid")]
    id: String,
}

impl WebApiClient {
    pub fn new(config: WebApiConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        let base_url = format!(
            "{}/api/data/v{}",
            config.environment_url.trim_end_matches('/'),
            config.api_version
        );
        Self {
            agent,
            base_url,
            token: config.token,
        }
    }

    fn url(&self, entity_set: &str) -> String {
        format!("{}/{entity_set}", self.base_url)
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/json")
            .set("OData-MaxVersion", "4.0")
            .set("OData-Version", "4.0")
    }

    /// GET every row of a query, following `@odata.nextLink` pages.
    fn query<T: DeserializeOwned>(
        &self,
        entity_set: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, ApiError> {
        let url = self.url(entity_set);
        let mut request = self.request("GET", &url);
        for (name, value) in params {
            request = request.query(name, value);
        }
        let mut page: Page<T> = read_json(request.call(), "GET", &url)?;
        let mut rows = std::mem::take(&mut page.value);
        while let Some(next) = page.next_link.take() {
            page = read_json(self.request("GET", &next).call(), "GET", &next)?;
            rows.append(&mut page.value);
        }
        Ok(rows)
    }

    fn post(
        &self,
        entity_set: &str,
        body: Value,
        solution: Option<&str>,
    ) -> Result<RemoteId, ApiError> {
        let url = self.url(entity_set);
        let mut request = self.request("POST", &url);
        if let Some(solution) = solution {
            request = request.set(SOLUTION_HEADER, solution);
        }
        let response = request
            .send_json(body)
            .map_err(|e| map_err(e, "POST", &url))?;
        let header = response
            .header(ENTITY_ID_HEADER)
            .ok_or_else(|| ApiError::Decode {
                url: url.clone(),
                reason: format!("missing {ENTITY_ID_HEADER} header"),
            })?;
        parse_entity_id(header).ok_or_else(|| ApiError::Decode {
            url,
            reason: format!("cannot parse {ENTITY_ID_HEADER} '{header}'"),
        })
    }

    fn patch(&self, entity_set: &str, id: &RemoteId, body: Value) -> Result<(), ApiError> {
        let url = format!("{}({id})", self.url(entity_set));
        self.request("PATCH", &url)
            .set("If-Match", "*")
            .send_json(body)
            .map_err(|e| map_err(e, "PATCH", &url))?;
        Ok(())
    }

    fn delete(&self, entity_set: &str, id: &RemoteId) -> Result<(), ApiError> {
        let url = format!("{}({id})", self.url(entity_set));
        self.request("DELETE", &url)
            .call()
            .map_err(|e| map_err(e, "DELETE", &url))?;
        Ok(())
    }

    fn find_message_id(&self, message: &str) -> Result<Option<RemoteId>, ApiError> {
        let filter = format!("name eq {}", literal(message));
        let rows: Vec<IdRow> = self.query(
            "sdkmessages",
            &[("$select", "sdkmessageid"), ("$filter", &filter)],
        )?;
        Ok(rows.into_iter().next().map(|r| RemoteId(r.id)))
    }
}

impl RegistrationApi for WebApiClient {
    fn find_assembly(&self, name: &str) -> Result<Option<AssemblyRef>, ApiError> {
        let filter = format!("name eq {}", literal(name));
        let rows: Vec<AssemblyRow> = self.query(
            "pluginassemblies",
            &[("$select", "pluginassemblyid,name"), ("$filter", &filter)],
        )?;
        Ok(rows.into_iter().next().map(|r| AssemblyRef {
            id: RemoteId(r.pluginassemblyid),
            name: r.name,
        }))
    }

    fn find_plugin_types_for_assembly(
        &self,
        assembly_id: &RemoteId,
    ) -> Result<Vec<PluginTypeRef>, ApiError> {
        let filter = format!("_pluginassemblyid_value eq {assembly_id}");
        let rows: Vec<PluginTypeRow> = self.query(
            "plugintypes",
            &[
                ("$select", "plugintypeid,typename"),
                ("$filter", &filter),
                ("$orderby", "typename"),
            ],
        )?;
        Ok(rows
            .into_iter()
            .map(|r| PluginTypeRef {
                id: RemoteId(r.plugintypeid),
                type_name: r.typename,
            })
            .collect())
    }

    fn find_steps_for_type(&self, plugin_type_id: &RemoteId) -> Result<Vec<StepRef>, ApiError> {
        let filter = format!("_eventhandler_value eq {plugin_type_id}");
        let rows: Vec<StepRow> = self.query(
            "sdkmessageprocessingsteps",
            &[
                (
                    "$select",
                    "sdkmessageprocessingstepid,_eventhandler_value,stage,mode,rank,filteringattributes,configuration",
                ),
                (
                    "$expand",
                    "sdkmessageid($select=name),sdkmessagefilterid($select=primaryobjecttypecode,secondaryobjecttypecode)",
                ),
                ("$filter", &filter),
                ("$orderby", "sdkmessageprocessingstepid"),
            ],
        )?;
        rows.into_iter().map(step_from_row).collect()
    }

    fn find_images_for_step(&self, step_id: &RemoteId) -> Result<Vec<ImageRef>, ApiError> {
        let filter = format!("_sdkmessageprocessingstepid_value eq {step_id}");
        let rows: Vec<ImageRow> = self.query(
            "sdkmessageprocessingstepimages",
            &[
                (
                    "$select",
                    "sdkmessageprocessingstepimageid,_sdkmessageprocessingstepid_value,name,imagetype,entityalias,attributes",
                ),
                ("$filter", &filter),
                ("$orderby", "name"),
            ],
        )?;
        rows.into_iter()
            .map(|r| {
                Ok(ImageRef {
                    id: RemoteId(r.sdkmessageprocessingstepimageid),
                    step_id: RemoteId(r.step_id),
                    entity_alias: r.entityalias.unwrap_or_else(|| r.name.clone()),
                    name: r.name,
                    image_type: ImageType::from_code(r.imagetype)?,
                    attributes: r.attributes.filter(|a| !a.is_empty()),
                })
            })
            .collect()
    }

    fn resolve_message_filter(
        &self,
        message: &str,
        primary_entity: &str,
        secondary_entity: Option<&str>,
    ) -> Result<Option<FilterRef>, ApiError> {
        let Some(message_id) = self.find_message_id(message)? else {
            return Ok(None);
        };
        let secondary = secondary_entity.filter(|s| !s.is_empty()).unwrap_or(NO_ENTITY);
        let filter = format!(
            "_sdkmessageid_value eq {message_id} and primaryobjecttypecode eq {} and secondaryobjecttypecode eq {}",
            literal(primary_entity),
            literal(secondary)
        );
        let rows: Vec<IdRow> = self.query(
            "sdkmessagefilters",
            &[("$select", "sdkmessagefilterid"), ("$filter", &filter)],
        )?;
        Ok(rows.into_iter().next().map(|r| FilterRef {
            message_id,
            filter_id: RemoteId(r.id),
        }))
    }

    fn create_step(&mut self, step: &NewStep) -> Result<RemoteId, ApiError> {
        let mut body = Map::new();
        body.insert("name".into(), json!(step.name));
        body.insert("stage".into(), json!(step.stage.code()));
        body.insert("mode".into(), json!(step.mode.code()));
        body.insert("rank".into(), json!(step.execution_order));
        body.insert("supporteddeployment".into(), json!(0));
        body.insert(
            "filteringattributes".into(),
            json!(step.filtering_attributes),
        );
        body.insert("configuration".into(), json!(step.configuration));
        if let Some(description) = &step.description {
            body.insert("description".into(), json!(description));
        }
        body.insert(
            "eventhandler_plugintype@odata.bind".into(),
            json!(format!("/plugintypes({})", step.plugin_type_id)),
        );
        body.insert(
            "sdkmessageid@odata.bind".into(),
            json!(format!("/sdkmessages({})", step.filter.message_id)),
        );
        body.insert(
            "sdkmessagefilterid@odata.bind".into(),
            json!(format!("/sdkmessagefilters({})", step.filter.filter_id)),
        );
        self.post(
            "sdkmessageprocessingsteps",
            Value::Object(body),
            step.solution.as_deref(),
        )
    }

    fn update_step(&mut self, id: &RemoteId, update: &StepUpdate) -> Result<(), ApiError> {
        self.patch(
            "sdkmessageprocessingsteps",
            id,
            json!({
                "mode": update.mode.code(),
                "rank": update.execution_order,
                "filteringattributes": update.filtering_attributes,
                "configuration": update.configuration,
            }),
        )
    }

    fn delete_step(&mut self, id: &RemoteId) -> Result<(), ApiError> {
        self.delete("sdkmessageprocessingsteps", id)
    }

    fn create_image(&mut self, image: &NewImage) -> Result<RemoteId, ApiError> {
        self.post(
            "sdkmessageprocessingstepimages",
            json!({
                "name": image.name,
                "entityalias": image.entity_alias,
                "imagetype": image.image_type.code(),
                "attributes": image.attributes,
                "messagepropertyname": image.message_property_name,
                "sdkmessageprocessingstepid@odata.bind":
                    format!("/sdkmessageprocessingsteps({})", image.step_id),
            }),
            image.solution.as_deref(),
        )
    }

    fn update_image(&mut self, id: &RemoteId, update: &ImageUpdate) -> Result<(), ApiError> {
        self.patch(
            "sdkmessageprocessingstepimages",
            id,
            json!({
                "entityalias": update.entity_alias,
                "attributes": update.attributes,
            }),
        )
    }

    fn delete_image(&mut self, id: &RemoteId) -> Result<(), ApiError> {
        self.delete("sdkmessageprocessingstepimages", id)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn step_from_row(row: StepRow) -> Result<StepRef, ApiError> {
    let filter = row.sdkmessagefilterid;
    let entity = |code: Option<String>| code.filter(|c| !c.is_empty() && c != NO_ENTITY);
    let (primary, secondary) = match filter {
        Some(f) => (entity(f.primaryobjecttypecode), entity(f.secondaryobjecttypecode)),
        None => (None, None),
    };
    Ok(StepRef {
        id: RemoteId(row.sdkmessageprocessingstepid),
        plugin_type_id: RemoteId(row.eventhandler),
        message: row.sdkmessageid.map(|m| m.name).unwrap_or_default(),
        primary_entity: primary.unwrap_or_default(),
        secondary_entity: secondary,
        stage: Stage::from_code(row.stage)?,
        mode: Mode::from_code(row.mode)?,
        execution_order: row.rank,
        filtering_attributes: row.filteringattributes.filter(|a| !a.is_empty()),
        configuration: row.configuration.filter(|c| !c.is_empty()),
    })
}

fn read_json<T: DeserializeOwned>(
    result: Result<ureq::Response, ureq::Error>,
    method: &'static str,
    url: &str,
) -> Result<T, ApiError> {
    let response = result.map_err(|e| map_err(e, method, url))?;
    response.into_json().map_err(|e| ApiError::Decode {
        url: url.to_owned(),
        reason: e.to_string(),
    })
}

fn map_err(err: ureq::Error, method: &'static str, url: &str) -> ApiError {
    match err {
        ureq::Error::Status(status, response) => ApiError::Status {
            method,
            url: url.to_owned(),
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => ApiError::Transport {
            method,
            url: url.to_owned(),
            reason: transport.to_string(),
        },
    }
}

/// OData string literal: single-quoted, embedded quotes doubled.
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Extract `<id>` from `https://.../entityset(<id>)`.
fn parse_entity_id(header: &str) -> Option<RemoteId> {
    let open = header.rfind('(')?;
    let close = header.rfind(')')?;
    let id = header.get(open + 1..close)?;
    (!id.is_empty()).then(|| RemoteId(id.to_owned()))
}
