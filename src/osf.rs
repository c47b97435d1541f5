use std::io;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::error::LyraError;

/// Hierarchical storage service, modeled as an explicit capability set so the
/// fetch and upload logic can run against an in-memory fake.
pub trait StorageClient: Send + Sync {
    /// Connect to a storage project. An absent credential means public
    /// read-only access. Connection and permission problems surface here,
    /// once, not in every later call.
    fn connect(
        &self,
        project_id: &str,
        credential: Option<&str>,
    ) -> Result<Box<dyn ProjectStorage>, LyraError>;
}

pub trait ProjectStorage {
    fn root(&self) -> Result<Box<dyn RemoteFolder>, LyraError>;

    /// Flat listing of every file in the project with its materialized path.
    fn files(&self) -> Result<Vec<Box<dyn RemoteFile>>, LyraError> {
        let mut collected = Vec::new();
        collect_files_into(&*self.root()?, &mut collected)?;
        Ok(collected)
    }

    /// Upload raw bytes to `path` (no leading slash). Intermediate remote
    /// folders must already exist; they are never created here.
    fn create_file(&self, path: &str, content: &[u8]) -> Result<(), LyraError>;
}

pub trait RemoteFolder {
    fn name(&self) -> &str;
    fn files(&self) -> Result<Vec<Box<dyn RemoteFile>>, LyraError>;
    fn folders(&self) -> Result<Vec<Box<dyn RemoteFolder>>, LyraError>;
}

pub trait RemoteFile {
    fn name(&self) -> &str;
    /// Materialized path from the storage root, with a leading slash.
    fn path(&self) -> &str;
    fn write_to(&self, sink: &mut dyn io::Write) -> Result<(), LyraError>;
    fn remove(&self) -> Result<(), LyraError>;
}

fn collect_files_into(
    folder: &dyn RemoteFolder,
    out: &mut Vec<Box<dyn RemoteFile>>,
) -> Result<(), LyraError> {
    out.extend(folder.files()?);
    for subfolder in folder.folders()? {
        collect_files_into(&*subfolder, out)?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct OsfHttpClient {
    client: Client,
    api_base: String,
    files_base: String,
}

impl OsfHttpClient {
    pub fn new() -> Result<Self, LyraError> {
        Self::with_bases("https://api.osf.io/v2", "https://files.osf.io/v1")
    }

    pub fn with_bases(
        api_base: impl Into<String>,
        files_base: impl Into<String>,
    ) -> Result<Self, LyraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("lyra-dm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| LyraError::ClientUnavailable(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| LyraError::ClientUnavailable(err.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            files_base: files_base.into(),
        })
    }
}

impl StorageClient for OsfHttpClient {
    fn connect(
        &self,
        project_id: &str,
        credential: Option<&str>,
    ) -> Result<Box<dyn ProjectStorage>, LyraError> {
        let ctx = OsfContext {
            client: self.client.clone(),
            token: credential.map(str::to_string),
        };
        // One upfront request verifies the project id and the credential.
        let node_url = format!("{}/nodes/{}/", self.api_base, project_id);
        ctx.send(ctx.client.get(&node_url))?;
        Ok(Box::new(OsfStorage {
            ctx,
            storage_url: format!("{}/nodes/{}/files/osfstorage/", self.api_base, project_id),
            upload_root: format!(
                "{}/resources/{}/providers/osfstorage/",
                self.files_base, project_id
            ),
        }))
    }
}

#[derive(Clone)]
struct OsfContext {
    client: Client,
    token: Option<String>,
}

impl OsfContext {
    fn send(&self, builder: RequestBuilder) -> Result<Response, LyraError> {
        let builder = match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        let response = builder
            .send()
            .map_err(|err| LyraError::StorageHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "storage request failed".to_string());
            return Err(LyraError::StorageStatus { status, message });
        }
        Ok(response)
    }

    /// Fetch a JSON API listing, following pagination links.
    fn list(&self, url: &str) -> Result<Vec<Entity>, LyraError> {
        let mut entities = Vec::new();
        let mut next = Some(url.to_string());
        while let Some(url) = next {
            let response = self.send(self.client.get(&url))?;
            let listing: Listing = response
                .json()
                .map_err(|err| LyraError::StorageHttp(err.to_string()))?;
            entities.extend(listing.data);
            next = listing.links.next;
        }
        Ok(entities)
    }
}

struct OsfStorage {
    ctx: OsfContext,
    storage_url: String,
    upload_root: String,
}

impl ProjectStorage for OsfStorage {
    fn root(&self) -> Result<Box<dyn RemoteFolder>, LyraError> {
        Ok(Box::new(OsfFolder {
            ctx: self.ctx.clone(),
            name: "osfstorage".to_string(),
            children_url: self.storage_url.clone(),
        }))
    }

    fn create_file(&self, path: &str, content: &[u8]) -> Result<(), LyraError> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let filename = segments
            .pop()
            .ok_or_else(|| LyraError::StorageHttp("empty upload path".to_string()))?;

        let mut upload_url = self.upload_root.clone();
        let mut children_url = self.storage_url.clone();
        for segment in segments {
            let entities = self.ctx.list(&children_url)?;
            let folder = entities
                .into_iter()
                .find(|entity| entity.attributes.kind == "folder" && entity.attributes.name == segment)
                .ok_or_else(|| {
                    LyraError::StorageHttp(format!(
                        "remote folder '{segment}' does not exist (intermediate folders are not created)"
                    ))
                })?;
            children_url = folder.children_url()?;
            upload_url = folder.links.upload.ok_or_else(|| {
                LyraError::StorageHttp(format!("folder '{segment}' has no upload link"))
            })?;
        }

        self.ctx.send(
            self.ctx
                .client
                .put(&upload_url)
                .query(&[("kind", "file"), ("name", filename)])
                .body(content.to_vec()),
        )?;
        Ok(())
    }
}

struct OsfFolder {
    ctx: OsfContext,
    name: String,
    children_url: String,
}

impl RemoteFolder for OsfFolder {
    fn name(&self) -> &str {
        &self.name
    }

    fn files(&self) -> Result<Vec<Box<dyn RemoteFile>>, LyraError> {
        let entities = self.ctx.list(&self.children_url)?;
        Ok(entities
            .into_iter()
            .filter(|entity| entity.attributes.kind == "file")
            .map(|entity| {
                let path = entity
                    .attributes
                    .materialized_path
                    .clone()
                    .unwrap_or_else(|| format!("/{}", entity.attributes.name));
                Box::new(OsfFile {
                    ctx: self.ctx.clone(),
                    name: entity.attributes.name,
                    path,
                    download_url: entity.links.download,
                    delete_url: entity.links.delete,
                }) as Box<dyn RemoteFile>
            })
            .collect())
    }

    fn folders(&self) -> Result<Vec<Box<dyn RemoteFolder>>, LyraError> {
        let entities = self.ctx.list(&self.children_url)?;
        entities
            .into_iter()
            .filter(|entity| entity.attributes.kind == "folder")
            .map(|entity| {
                let children_url = entity.children_url()?;
                Ok(Box::new(OsfFolder {
                    ctx: self.ctx.clone(),
                    name: entity.attributes.name,
                    children_url,
                }) as Box<dyn RemoteFolder>)
            })
            .collect()
    }
}

struct OsfFile {
    ctx: OsfContext,
    name: String,
    path: String,
    download_url: Option<String>,
    delete_url: Option<String>,
}

impl RemoteFile for OsfFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn write_to(&self, sink: &mut dyn io::Write) -> Result<(), LyraError> {
        let url = self
            .download_url
            .as_ref()
            .ok_or_else(|| LyraError::StorageHttp(format!("file {} has no download link", self.name)))?;
        let mut response = self.ctx.send(self.ctx.client.get(url))?;
        io::copy(&mut response, sink).map_err(|err| LyraError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn remove(&self) -> Result<(), LyraError> {
        let url = self
            .delete_url
            .as_ref()
            .ok_or_else(|| LyraError::StorageHttp(format!("file {} has no delete link", self.name)))?;
        self.ctx.send(self.ctx.client.delete(url))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: Vec<Entity>,
    #[serde(default)]
    links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct PageLinks {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Entity {
    attributes: EntityAttributes,
    #[serde(default)]
    links: EntityLinks,
    #[serde(default)]
    relationships: Option<EntityRelationships>,
}

impl Entity {
    fn children_url(&self) -> Result<String, LyraError> {
        self.relationships
            .as_ref()
            .and_then(|relationships| relationships.files.as_ref())
            .map(|relationship| relationship.links.related.href.clone())
            .ok_or_else(|| {
                LyraError::StorageHttp(format!(
                    "folder {} has no files relationship",
                    self.attributes.name
                ))
            })
    }
}

#[derive(Debug, Deserialize)]
struct EntityAttributes {
    kind: String,
    name: String,
    #[serde(default)]
    materialized_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EntityLinks {
    #[serde(default)]
    download: Option<String>,
    #[serde(default)]
    upload: Option<String>,
    #[serde(default)]
    delete: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntityRelationships {
    #[serde(default)]
    files: Option<Relationship>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    links: RelationshipLinks,
}

#[derive(Debug, Deserialize)]
struct RelationshipLinks {
    related: RelatedLink,
}

#[derive(Debug, Deserialize)]
struct RelatedLink {
    href: String,
}
