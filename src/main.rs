use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn, Level};

use taxi_reservations::cache::{CacheConfig, RedisClient};
use taxi_reservations::config::{DatabaseConfig, EnvironmentConfig};
use taxi_reservations::create_app;
use taxi_reservations::repositories::{
    InMemoryReservationRepository, PgReservationRepository, ReservationRepository,
};
use taxi_reservations::services::notification_service::{
    LogNotifier, Notifier, ResendConfig, ResendNotifier, RESEND_API_URL,
};
use taxi_reservations::services::pricing_service::PricingService;
use taxi_reservations::services::reservation_service::{ReservationService, ReservationSettings};
use taxi_reservations::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    let config = EnvironmentConfig::from_env()?;

    // Configurar logging
    let level = Level::from_str(&config.log_level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("🚕 Taxi Réservations - API de reservas");
    info!("================================================");
    info!("🌍 Entorno: {}", config.environment);

    // Persistencia: Postgres si hay DATABASE_URL, memoria en otro caso
    let repository: Arc<dyn ReservationRepository> = match &config.database_url {
        Some(url) => {
            let pool = match DatabaseConfig::new(url.clone()).create_pool().await {
                Ok(pool) => pool,
                Err(e) => {
                    error!("❌ Error conectando a la base de datos: {}", e);
                    return Err(anyhow::anyhow!("Error de base de datos: {}", e));
                }
            };
            DatabaseConfig::run_migrations(&pool).await?;
            info!("✅ Base de datos conectada y migrada");
            Arc::new(PgReservationRepository::new(pool))
        }
        None => {
            warn!("⚠️ DATABASE_URL no definida, reservas guardadas solo en memoria");
            Arc::new(InMemoryReservationRepository::new())
        }
    };

    // Notificaciones: Resend si hay clave, log en otro caso
    let notifier: Arc<dyn Notifier> = match &config.resend_api_key {
        Some(api_key) => Arc::new(ResendNotifier::new(ResendConfig {
            api_key: api_key.clone(),
            from: config.email_from.clone(),
            api_url: RESEND_API_URL.to_string(),
            request_timeout: config.notification_timeout,
        })?),
        None => {
            warn!("⚠️ RESEND_API_KEY no definida, los correos solo se registran en el log");
            Arc::new(LogNotifier)
        }
    };

    let settings = ReservationSettings {
        strict_status_transitions: config.strict_status_transitions,
        notification_timeout: config.notification_timeout,
        operator_emails: config.operator_emails.clone(),
        cache_ttl_seconds: config.cache_ttl_seconds,
    };
    let mut service = ReservationService::new(
        repository,
        notifier,
        PricingService::new(config.tariff.clone()),
        settings,
    );

    // Redis es opcional: sin conexión se sirve directamente del repositorio
    if let Some(redis_url) = &config.redis_url {
        let cache_config = CacheConfig {
            redis_url: redis_url.clone(),
            default_ttl: config.cache_ttl_seconds,
            ..CacheConfig::default()
        };
        match RedisClient::new(cache_config).await {
            Ok(client) if client.is_connected().await => {
                info!("✅ Redis conectado exitosamente");
                service = service.with_cache(client);
            }
            Ok(_) => warn!("⚠️ Redis no responde al PING, cache desactivado"),
            Err(e) => warn!("⚠️ Redis no disponible, cache desactivado: {}", e),
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let app = create_app(AppState::new(config, service));

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET   /health - Estado del servicio");
    info!("   POST  /api/quote - Presupuesto de trayecto");
    info!("🚖 Endpoints - Reservas:");
    info!("   POST  /api/reservations - Crear reserva");
    info!("   GET   /api/reservations?phone= - Reservas por teléfono");
    info!("   GET   /api/reservations/active - Reservas activas");
    info!("   GET   /api/reservations/stats - Estadísticas por estado");
    info!("   GET   /api/reservations/driver/:driver_id - Reservas de un chófer");
    info!("   GET   /api/reservations/:id - Obtener reserva");
    info!("   PATCH /api/reservations/:id/status - Cambiar estado");
    info!("   POST  /api/reservations/:id/driver - Asignar chófer");
    info!("   POST  /api/reservations/:id/payment - Registrar pago");
    info!("   POST  /api/reservations/:id/rating - Valoración del cliente");

    // Iniciar servidor en background
    let server_handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                error!("❌ Error del servidor: {}", e);
                e
            })
    });

    // Esperar a que el servidor termine
    if let Err(e) = server_handle.await? {
        error!("❌ Servidor terminó con error: {}", e);
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo escuchar Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el manejador de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
