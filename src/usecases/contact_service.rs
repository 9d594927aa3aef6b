//! Contacts and organizations.

use super::audit_service::{snapshot, AuditService};
use crate::adapters::export::{contacts_to_csv, parse_contacts_csv};
use crate::domain::inputs::{
    check_phone, BulkImportInput, ContactQuery, CreateContactInput, CreateOrganizationInput,
    UpdateContactInput, UpdateOrganizationInput,
};
use crate::domain::{
    paging, Channel, Contact, DomainError, ImportFailure, ImportResult, Organization, Page,
};
use crate::ports::{ContactRepo, OrganizationRepo};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub struct ContactService {
    contacts: Arc<dyn ContactRepo>,
    orgs: Arc<dyn OrganizationRepo>,
    audit: Arc<AuditService>,
}

impl ContactService {
    pub fn new(
        contacts: Arc<dyn ContactRepo>,
        orgs: Arc<dyn OrganizationRepo>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            contacts,
            orgs,
            audit,
        }
    }

    pub async fn list(
        &self,
        tenant_id: &str,
        query: &ContactQuery,
    ) -> Result<Page<Contact>, DomainError> {
        let (page, limit) = paging(query.page, query.limit);
        let (contacts, total) = self
            .contacts
            .list_contacts(tenant_id, query, page, limit)
            .await?;
        Ok(Page::new(contacts, total, page, limit))
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> Result<Contact, DomainError> {
        self.contacts
            .get_contact(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("Contact"))
    }

    pub async fn get_by_phone(&self, tenant_id: &str, phone: &str) -> Result<Contact, DomainError> {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        self.contacts
            .find_contact_by_phone(tenant_id, &digits)
            .await?
            .ok_or_else(|| DomainError::not_found("Contact"))
    }

    async fn check_organization(
        &self,
        tenant_id: &str,
        organization_id: Option<&str>,
    ) -> Result<(), DomainError> {
        if let Some(org_id) = organization_id {
            if self.orgs.get_organization(tenant_id, org_id).await?.is_none() {
                return Err(DomainError::not_found("Organization"));
            }
        }
        Ok(())
    }

    async fn check_email_free(
        &self,
        tenant_id: &str,
        email: &str,
        except_id: Option<&str>,
    ) -> Result<(), DomainError> {
        match self.contacts.find_contact_by_email(tenant_id, email).await? {
            Some(other) if Some(other.id.as_str()) != except_id => Err(DomainError::bad_request(
                "a contact with this email already exists",
            )),
            _ => Ok(()),
        }
    }

    pub async fn create(
        &self,
        tenant_id: &str,
        mut input: CreateContactInput,
    ) -> Result<Contact, DomainError> {
        input.normalize_and_validate()?;
        if self
            .contacts
            .find_contact_by_phone(tenant_id, &input.phone_number)
            .await?
            .is_some()
        {
            return Err(DomainError::bad_request(
                "a contact with this phone number already exists",
            ));
        }
        if let Some(email) = &input.email {
            self.check_email_free(tenant_id, email, None).await?;
        }
        self.check_organization(tenant_id, input.organization_id.as_deref())
            .await?;

        let now = Utc::now();
        let contact = Contact {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            channel: Channel::WhatsApp,
            external_id: input.phone_number.clone(),
            phone_number: Some(input.phone_number),
            name: input.name,
            email: input.email,
            profile_picture_url: input.profile_picture_url,
            organization_id: input.organization_id,
            metadata: input.metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
            conversations_count: 0,
            last_conversation_at: None,
        };
        self.contacts.create_contact(&contact).await?;
        info!(tenant_id, contact_id = %contact.id, "contact created");
        self.audit
            .entity_event(tenant_id, "CREATE", "Contact", &contact.id, None, snapshot(&contact));
        Ok(contact)
    }

    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        mut input: UpdateContactInput,
    ) -> Result<Contact, DomainError> {
        input.normalize_and_validate()?;
        let before = self.get(tenant_id, id).await?;
        let mut contact = before.clone();

        if let Some(email) = input.email {
            self.check_email_free(tenant_id, &email, Some(id)).await?;
            contact.email = Some(email);
        }
        if let Some(org) = input.organization_id {
            self.check_organization(tenant_id, org.as_deref()).await?;
            contact.organization_id = org;
        }
        if let Some(name) = input.name {
            contact.name = Some(name);
        }
        if let Some(url) = input.profile_picture_url {
            contact.profile_picture_url = url;
        }
        if let Some(metadata) = input.metadata {
            contact.metadata = metadata.unwrap_or_else(|| serde_json::json!({}));
        }
        contact.updated_at = Utc::now();

        self.contacts.update_contact(&contact).await?;
        info!(tenant_id, contact_id = %contact.id, "contact updated");
        self.audit.entity_event(
            tenant_id,
            "UPDATE",
            "Contact",
            id,
            snapshot(&before),
            snapshot(&contact),
        );
        Ok(contact)
    }

    pub async fn delete(&self, tenant_id: &str, id: &str) -> Result<(), DomainError> {
        let contact = self.get(tenant_id, id).await?;
        self.contacts.delete_contact(tenant_id, id).await?;
        info!(tenant_id, contact_id = %id, "contact deleted");
        self.audit
            .entity_event(tenant_id, "DELETE", "Contact", id, snapshot(&contact), None);
        Ok(())
    }

    /// Create contacts in order. Phones that already exist are skipped; rows
    /// that fail validation are reported and do not stop the import.
    pub async fn bulk_import(
        &self,
        tenant_id: &str,
        input: BulkImportInput,
    ) -> Result<ImportResult, DomainError> {
        input.validate()?;
        let mut result = ImportResult {
            created: 0,
            skipped: 0,
            failed: Vec::new(),
        };
        for (index, row) in input.contacts.into_iter().enumerate() {
            let phone = row.phone_number.clone();
            if check_phone(&phone).is_ok()
                && self
                    .contacts
                    .find_contact_by_phone(tenant_id, &phone)
                    .await?
                    .is_some()
            {
                result.skipped += 1;
                continue;
            }
            match self.create(tenant_id, row).await {
                Ok(_) => result.created += 1,
                Err(DomainError::BadRequest(error)) | Err(DomainError::NotFound(error)) => {
                    result.failed.push(ImportFailure {
                        index,
                        phone_number: phone,
                        error,
                    })
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            tenant_id,
            created = result.created,
            skipped = result.skipped,
            failed = result.failed.len(),
            "contact import finished"
        );
        Ok(result)
    }

    pub async fn import_csv(&self, tenant_id: &str, data: &str) -> Result<ImportResult, DomainError> {
        let contacts = parse_contacts_csv(data)?;
        self.bulk_import(tenant_id, BulkImportInput { contacts }).await
    }

    pub async fn export_csv(&self, tenant_id: &str) -> Result<String, DomainError> {
        let contacts = self.contacts.all_contacts(tenant_id).await?;
        contacts_to_csv(&contacts)
            .map_err(|e| DomainError::Repo(format!("Failed to generate CSV: {}", e)))
    }

    // ── organizations ───────────────────────────────────────────────────

    pub async fn list_organizations(
        &self,
        tenant_id: &str,
        search: Option<&str>,
    ) -> Result<Vec<Organization>, DomainError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.orgs.list_organizations(tenant_id, search).await
    }

    pub async fn get_organization(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<Organization, DomainError> {
        self.orgs
            .get_organization(tenant_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found("Organization"))
    }

    async fn check_org_name_free(
        &self,
        tenant_id: &str,
        name: &str,
        except_id: Option<&str>,
    ) -> Result<(), DomainError> {
        match self.orgs.find_organization_by_name(tenant_id, name).await? {
            Some(other) if Some(other.id.as_str()) != except_id => Err(DomainError::bad_request(
                "an organization with this name already exists",
            )),
            _ => Ok(()),
        }
    }

    pub async fn create_organization(
        &self,
        tenant_id: &str,
        input: CreateOrganizationInput,
    ) -> Result<Organization, DomainError> {
        input.validate()?;
        let name = input.name.trim().to_string();
        self.check_org_name_free(tenant_id, &name, None).await?;
        let now = Utc::now();
        let org = Organization {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name,
            website: input.website,
            industry: input.industry,
            employees: input.employees,
            address: input.address,
            created_at: now,
            updated_at: now,
            contacts_count: 0,
        };
        self.orgs.create_organization(&org).await?;
        info!(tenant_id, organization_id = %org.id, "organization created");
        self.audit
            .entity_event(tenant_id, "CREATE", "Organization", &org.id, None, snapshot(&org));
        Ok(org)
    }

    pub async fn update_organization(
        &self,
        tenant_id: &str,
        id: &str,
        input: UpdateOrganizationInput,
    ) -> Result<Organization, DomainError> {
        input.validate()?;
        let before = self.get_organization(tenant_id, id).await?;
        let mut org = before.clone();
        if let Some(name) = input.name {
            let name = name.trim().to_string();
            self.check_org_name_free(tenant_id, &name, Some(id)).await?;
            org.name = name;
        }
        if let Some(v) = input.website {
            org.website = v;
        }
        if let Some(v) = input.industry {
            org.industry = v;
        }
        if let Some(v) = input.employees {
            org.employees = v;
        }
        if let Some(v) = input.address {
            org.address = v;
        }
        org.updated_at = Utc::now();
        self.orgs.update_organization(&org).await?;
        info!(tenant_id, organization_id = %id, "organization updated");
        self.audit.entity_event(
            tenant_id,
            "UPDATE",
            "Organization",
            id,
            snapshot(&before),
            snapshot(&org),
        );
        Ok(org)
    }

    /// Deletes the organization; its contacts stay, detached.
    pub async fn delete_organization(&self, tenant_id: &str, id: &str) -> Result<(), DomainError> {
        if !self.orgs.delete_organization(tenant_id, id).await? {
            return Err(DomainError::not_found("Organization"));
        }
        info!(tenant_id, organization_id = %id, "organization deleted");
        self.audit
            .entity_event(tenant_id, "DELETE", "Organization", id, None, None);
        Ok(())
    }

    pub async fn link_contact(
        &self,
        tenant_id: &str,
        organization_id: &str,
        contact_id: &str,
    ) -> Result<Contact, DomainError> {
        self.get_organization(tenant_id, organization_id).await?;
        let mut contact = self.get(tenant_id, contact_id).await?;
        contact.organization_id = Some(organization_id.to_string());
        contact.updated_at = Utc::now();
        self.contacts.update_contact(&contact).await?;
        info!(tenant_id, organization_id, contact_id, "contact linked to organization");
        Ok(contact)
    }

    pub async fn unlink_contact(
        &self,
        tenant_id: &str,
        organization_id: &str,
        contact_id: &str,
    ) -> Result<Contact, DomainError> {
        let mut contact = self.get(tenant_id, contact_id).await?;
        if contact.organization_id.as_deref() != Some(organization_id) {
            return Err(DomainError::bad_request(
                "contact does not belong to this organization",
            ));
        }
        contact.organization_id = None;
        contact.updated_at = Utc::now();
        self.contacts.update_contact(&contact).await?;
        info!(tenant_id, organization_id, contact_id, "contact unlinked from organization");
        Ok(contact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::sqlite_repo::test_support::{repo, seeded_tenant};
    use crate::adapters::persistence::SqliteRepo;
    use crate::domain::Tenant;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Tenant, Tenant, ContactService) {
        let (dir, repo) = repo().await;
        let a = seeded_tenant(&repo, "hotel-ca").await;
        let b = seeded_tenant(&repo, "hotel-cb").await;
        let repo: Arc<SqliteRepo> = Arc::new(repo);
        let svc = ContactService::new(repo.clone(), repo.clone(), Arc::new(AuditService::new(repo)));
        (dir, a, b, svc)
    }

    fn input(phone: &str) -> CreateContactInput {
        CreateContactInput {
            phone_number: phone.into(),
            name: Some("  Maria  ".into()),
            email: None,
            profile_picture_url: None,
            organization_id: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn create_validates_and_enforces_uniqueness() {
        let (_dir, a, b, svc) = setup().await;
        let c = svc.create(&a.id, input("5511999999999")).await.unwrap();
        assert_eq!(c.name.as_deref(), Some("Maria"));
        assert_eq!(c.external_id, "5511999999999");

        let dup = svc.create(&a.id, input("5511999999999")).await.unwrap_err();
        assert!(matches!(dup, DomainError::BadRequest(_)));
        assert!(svc.create(&b.id, input("5511999999999")).await.is_ok());

        assert!(svc.create(&a.id, input("551199999")).await.is_err());
        assert!(svc.create(&a.id, input("55119999-9999")).await.is_err());

        let found = svc.get_by_phone(&a.id, "+55 11 99999-9999").await.unwrap();
        assert_eq!(found.id, c.id);
    }

    #[tokio::test]
    async fn update_requires_a_field_and_checks_email() {
        let (_dir, a, _b, svc) = setup().await;
        let mut first = input("5511911111111");
        first.email = Some("ana@x.test".into());
        svc.create(&a.id, first).await.unwrap();
        let second = svc.create(&a.id, input("5511922222222")).await.unwrap();

        assert!(svc.update(&a.id, &second.id, UpdateContactInput::default()).await.is_err());
        let taken = UpdateContactInput {
            email: Some("ANA@x.test".into()),
            ..Default::default()
        };
        assert!(svc.update(&a.id, &second.id, taken).await.is_err());

        let rename = UpdateContactInput {
            name: Some("Bia".into()),
            ..Default::default()
        };
        assert_eq!(
            svc.update(&a.id, &second.id, rename).await.unwrap().name.as_deref(),
            Some("Bia")
        );
    }

    #[tokio::test]
    async fn bulk_import_counts_created_skipped_failed() {
        let (_dir, a, _b, svc) = setup().await;
        svc.create(&a.id, input("5511933333333")).await.unwrap();
        let result = svc
            .bulk_import(
                &a.id,
                BulkImportInput {
                    contacts: vec![
                        input("5511933333333"),
                        input("5511944444444"),
                        input("123"),
                    ],
                },
            )
            .await
            .unwrap();
        assert_eq!(result.created, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].index, 2);

        let empty = svc
            .bulk_import(&a.id, BulkImportInput { contacts: vec![] })
            .await;
        assert!(empty.is_err());
    }

    #[tokio::test]
    async fn csv_round_trip_through_service() {
        let (_dir, a, _b, svc) = setup().await;
        let result = svc
            .import_csv(&a.id, "phoneNumber,name\n5511955555555,Carla\n")
            .await
            .unwrap();
        assert_eq!(result.created, 1);
        let csv = svc.export_csv(&a.id).await.unwrap();
        assert!(csv.contains("Carla"));
        assert!(csv.contains("5511955555555"));
    }

    #[tokio::test]
    async fn organizations_unique_names_and_linking() {
        let (_dir, a, b, svc) = setup().await;
        let org_input = || CreateOrganizationInput {
            name: "Agência Viagem".into(),
            website: None,
            industry: None,
            employees: None,
            address: None,
        };
        let org = svc.create_organization(&a.id, org_input()).await.unwrap();
        assert!(svc.create_organization(&a.id, org_input()).await.is_err());
        assert!(svc.create_organization(&b.id, org_input()).await.is_ok());

        let contact = svc.create(&a.id, input("5511966666666")).await.unwrap();
        let linked = svc.link_contact(&a.id, &org.id, &contact.id).await.unwrap();
        assert_eq!(linked.organization_id.as_deref(), Some(org.id.as_str()));
        assert_eq!(svc.get_organization(&a.id, &org.id).await.unwrap().contacts_count, 1);

        svc.delete_organization(&a.id, &org.id).await.unwrap();
        assert!(svc.get(&a.id, &contact.id).await.unwrap().organization_id.is_none());
    }
}
