use crate::{
    db::DbPool,
    entities::order_request::{self, Entity as OrderRequestEntity},
    entities::patient::{self, Entity as PatientEntity},
    errors::ServiceError,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreatePatientRequest {
    #[validate(length(min = 1, max = 200, message = "Patient name is required"))]
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 100, message = "Ward name is too long"))]
    pub ward: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdatePatientRequest {
    #[validate(length(min = 1, max = 200, message = "Patient name cannot be empty"))]
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 100, message = "Ward name is too long"))]
    pub ward: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PatientListResponse {
    pub patients: Vec<patient::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for the ward patient registry.
#[derive(Clone)]
pub struct PatientService {
    db_pool: Arc<DbPool>,
}

impl PatientService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(full_name = %request.full_name))]
    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
    ) -> Result<patient::Model, ServiceError> {
        request.validate()?;

        if let Some(dob) = request.date_of_birth {
            if dob > Utc::now().date_naive() {
                return Err(ServiceError::ValidationError(
                    "Date of birth cannot be in the future".to_string(),
                ));
            }
        }

        let db = &*self.db_pool;
        let model = patient::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set(request.full_name),
            date_of_birth: Set(request.date_of_birth),
            ward: Set(request.ward),
            notes: Set(request.notes),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await?;

        info!(patient_id = %model.id, "patient registered");
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn get_patient(&self, patient_id: Uuid) -> Result<patient::Model, ServiceError> {
        let db = &*self.db_pool;
        PatientEntity::find_by_id(patient_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Patient {} not found", patient_id)))
    }

    #[instrument(skip(self))]
    pub async fn list_patients(
        &self,
        search: Option<String>,
        ward: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<PatientListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = PatientEntity::find();
        if let Some(search) = &search {
            query = query.filter(patient::Column::FullName.like(format!("%{}%", search)));
        }
        if let Some(ward) = &ward {
            query = query.filter(patient::Column::Ward.eq(ward.as_str()));
        }

        let total = query.clone().count(db).await?;
        let patients = query
            .order_by_asc(patient::Column::FullName)
            .limit(per_page)
            .offset((page - 1) * per_page)
            .all(db)
            .await?;

        Ok(PatientListResponse {
            patients,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<patient::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let model = self.get_patient(patient_id).await?;

        let mut active: patient::ActiveModel = model.into();
        if let Some(full_name) = request.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(date_of_birth) = request.date_of_birth {
            active.date_of_birth = Set(Some(date_of_birth));
        }
        if let Some(ward) = request.ward {
            active.ward = Set(Some(ward));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await?;
        Ok(updated)
    }

    /// Removes a patient record. Refused while order requests reference it.
    #[instrument(skip(self))]
    pub async fn delete_patient(&self, patient_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let model = self.get_patient(patient_id).await?;

        let referenced = OrderRequestEntity::find()
            .filter(order_request::Column::PatientId.eq(patient_id))
            .count(db)
            .await?;
        if referenced > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Patient has {} order request(s) on record",
                referenced
            )));
        }

        model.delete(db).await?;
        info!(patient_id = %patient_id, "patient deleted");
        Ok(())
    }
}
