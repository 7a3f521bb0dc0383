use chrono::Utc;
use rust_decimal::Decimal;

use crate::dto::reservation_dto::{
    ActorInput, AssignDriverRequest, CreateReservationRequest, PhoneQuery, QuoteRequest,
    QuoteResponse, RecordPaymentRequest, ReservationResponse, StatsQuery, StatsResponse,
    UpdateStatusRequest,
};
use crate::dto::ApiResponse;
use crate::models::event::{Actor, ActorType};
use crate::models::reservation::{
    validate_request_parts, Rating, ReservationDraft, SubmissionMetadata,
};
use crate::models::trip::Trip;
use crate::services::reservation_service::ReservationService;
use crate::utils::errors::{AppError, AppResult};

/// Datos del cliente HTTP extraídos de las cabeceras
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl RequestContext {
    fn actor(&self, input: Option<ActorInput>, default_type: ActorType) -> Actor {
        ActorInput::into_actor(input, default_type)
            .with_client(self.ip_address.clone(), self.user_agent.clone())
    }
}

pub struct ReservationController {
    service: ReservationService,
}

impl ReservationController {
    pub fn new(service: ReservationService) -> Self {
        Self { service }
    }

    pub fn quote(&self, request: QuoteRequest) -> AppResult<ApiResponse<QuoteResponse>> {
        let pricing = self
            .service
            .quote(request.distance_km, request.duration_minutes, &request.booking)?;

        Ok(ApiResponse::success(QuoteResponse::new(
            pricing,
            request.duration_minutes,
        )))
    }

    pub async fn create(
        &self,
        request: CreateReservationRequest,
        context: RequestContext,
    ) -> AppResult<ApiResponse<ReservationResponse>> {
        let now = Utc::now();
        let CreateReservationRequest {
            trip,
            booking,
            mut customer,
            pricing,
            metadata,
        } = request;
        let estimated_price = trip.estimated_price;

        if customer.ip_address.is_none() {
            customer.ip_address = context.ip_address.clone();
        }

        let mut trip = Trip {
            origin: trip.origin,
            destination: trip.destination,
            distance_km: trip.distance_km,
            duration_minutes: trip.duration_minutes,
            route: trip.route,
            estimated_price: estimated_price.unwrap_or(Decimal::ZERO),
            calculated_at: now,
        };

        // Sin tarifa explícita se calcula, pero solo sobre un formulario válido
        let pricing = match pricing {
            Some(pricing) => pricing,
            None => {
                validate_request_parts(&trip, &booking, &customer, now)?;
                self.service.pricing().quote(
                    trip.distance_km,
                    trip.duration_minutes,
                    &booking,
                    booking.pickup_time(now),
                )?
            }
        };
        if estimated_price.is_none() {
            trip.estimated_price = pricing.total_price;
        }

        let draft = ReservationDraft {
            trip,
            booking,
            customer,
            pricing,
            metadata: SubmissionMetadata {
                source: metadata.source.unwrap_or_else(|| "website".to_string()),
                platform: metadata.platform,
                user_agent: context.user_agent,
                referrer: context.referrer,
                session_id: metadata.session_id,
                ip_address: context.ip_address,
                api_version: metadata.api_version.unwrap_or_else(|| "v1".to_string()),
            },
        };

        let created = self.service.create(draft).await?;
        let message = format!("Réservation {} enregistrée", created.reservation.id);

        Ok(
            ApiResponse::success_with_message(created.reservation.into(), message)
                .with_warnings(created.warnings),
        )
    }

    pub async fn get_by_id(&self, id: &str) -> AppResult<ApiResponse<ReservationResponse>> {
        let reservation = self.service.find_by_id(id).await?;
        Ok(ApiResponse::success(reservation.into()))
    }

    pub async fn list_by_phone(&self, query: PhoneQuery) -> AppResult<ApiResponse<Vec<ReservationResponse>>> {
        let phone = query
            .phone
            .ok_or_else(|| AppError::BadRequest("The phone query parameter is required".to_string()))?;

        let reservations = self.service.find_by_phone(&phone).await?;
        Ok(ApiResponse::success(
            reservations.into_iter().map(ReservationResponse::from).collect(),
        ))
    }

    pub async fn list_active(&self) -> AppResult<ApiResponse<Vec<ReservationResponse>>> {
        let reservations = self.service.find_active().await?;
        Ok(ApiResponse::success(
            reservations.into_iter().map(ReservationResponse::from).collect(),
        ))
    }

    pub async fn list_by_driver(&self, driver_id: &str) -> AppResult<ApiResponse<Vec<ReservationResponse>>> {
        let reservations = self.service.find_by_driver(driver_id).await?;
        Ok(ApiResponse::success(
            reservations.into_iter().map(ReservationResponse::from).collect(),
        ))
    }

    pub async fn stats(&self, query: StatsQuery) -> AppResult<ApiResponse<StatsResponse>> {
        let (window, stats) = self.service.stats(query.from, query.to).await?;
        Ok(ApiResponse::success(StatsResponse::new(window, stats)))
    }

    pub async fn update_status(
        &self,
        id: &str,
        request: UpdateStatusRequest,
        context: RequestContext,
    ) -> AppResult<ApiResponse<ReservationResponse>> {
        let actor = context.actor(request.actor, ActorType::Admin);
        let reservation = self
            .service
            .update_status(id, request.status, request.description, request.metadata, &actor)
            .await?;

        let message = format!("Statut mis à jour : {}", reservation.status());
        Ok(ApiResponse::success_with_message(reservation.into(), message))
    }

    pub async fn assign_driver(
        &self,
        id: &str,
        request: AssignDriverRequest,
        context: RequestContext,
    ) -> AppResult<ApiResponse<ReservationResponse>> {
        let actor = context.actor(request.actor, ActorType::Admin);
        let reservation = self.service.assign_driver(id, request.driver, &actor).await?;
        Ok(ApiResponse::success_with_message(
            reservation.into(),
            "Chauffeur assigné".to_string(),
        ))
    }

    pub async fn record_payment(
        &self,
        id: &str,
        request: RecordPaymentRequest,
        context: RequestContext,
    ) -> AppResult<ApiResponse<ReservationResponse>> {
        let actor = context.actor(request.actor, ActorType::System);
        let reservation = self
            .service
            .record_payment(
                id,
                request.method,
                request.status,
                request.amount,
                request.transaction_id,
                &actor,
            )
            .await?;
        Ok(ApiResponse::success(reservation.into()))
    }

    pub async fn submit_rating(
        &self,
        id: &str,
        rating: Rating,
        context: RequestContext,
    ) -> AppResult<ApiResponse<ReservationResponse>> {
        let actor = context.actor(None, ActorType::Customer);
        let reservation = self.service.submit_rating(id, rating, &actor).await?;
        Ok(ApiResponse::success_with_message(
            reservation.into(),
            "Merci pour votre avis".to_string(),
        ))
    }
}
