/*
Trazo - captura de gestos IMU y clasificación por rasterización

El pipeline por ciclo de muestreo:
1. Estimación de deriva del giroscopio y de la dirección de gravedad
2. Integración de orientación (cuaterniones) y de velocidad compensada
3. Máquina de estados del trazo: detecta inicio/fin y acumula el camino
4. Al completarse un gesto sin enlace: rasterización a 32x32x3 y
   clasificación
5. Con enlace activo: streaming de instantáneas de 328 bytes cada 16 ciclos

El enlace serie corre aparte: un hilo RX arma tramas de comando
(0xF5 0xF4 ... 0x0D 0x0A) y las entrega por canal acotado a la sesión.
*/

pub mod classifier;
pub mod csv_loader;
pub mod display;
pub mod fusion;
pub mod imu;
pub mod link;
pub mod orientation;
pub mod pipeline;
pub mod rasterizer;
pub mod stroke_tracker;
pub mod types;
pub mod wire;
